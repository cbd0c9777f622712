use tokio::sync::mpsc;

use crate::test_utils::{TestEnv, TestUtils, REPLICATION_ID};

#[tokio::test]
async fn test_handle_info_command_on_master() {
    let env = TestEnv::new_master_server();

    let body = format!(
        "# Replication\r\nrole:master\r\nconnected_slaves:0\r\nmaster_replid:{}\r\nmaster_repl_offset:0",
        REPLICATION_ID
    );

    env.exec_command_immediate_success_response(
        TestUtils::info_command(),
        &TestUtils::client_address(41844),
        &TestUtils::expected_bulk_string(&body),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_lists_replica_offsets() {
    let env = TestEnv::new_master_server();
    let (first_sender, _first_receiver) = mpsc::channel(8);
    let (second_sender, _second_receiver) = mpsc::channel(8);

    env.state
        .replicas
        .register(TestUtils::client_address(50001), first_sender)
        .await;
    env.state
        .replicas
        .register(TestUtils::client_address(50000), second_sender)
        .await;
    env.state
        .replicas
        .record_ack(&TestUtils::client_address(50001), 62)
        .await;

    let body = format!(
        "# Replication\r\nrole:master\r\nconnected_slaves:2\r\nslave0:ip=127.0.0.1,port=50000,offset=0\r\nslave1:ip=127.0.0.1,port=50001,offset=62\r\nmaster_replid:{}\r\nmaster_repl_offset:0",
        REPLICATION_ID
    );

    env.exec_command_immediate_success_response(
        TestUtils::info_command(),
        &TestUtils::client_address(41844),
        &TestUtils::expected_bulk_string(&body),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_on_replica() {
    let env = TestEnv::new_replica_server(6380);
    env.state.offset.advance(37);

    let body = format!(
        "# Replication\r\nrole:slave\r\nmaster_host:127.0.0.1\r\nmaster_port:6379\r\nslave_repl_offset:37\r\nmaster_replid:{}\r\nmaster_repl_offset:0",
        REPLICATION_ID
    );

    env.exec_command_immediate_success_response(
        TestUtils::info_command(),
        &TestUtils::client_address(41844),
        &TestUtils::expected_bulk_string(&body),
    )
    .await;
}

#[tokio::test]
async fn test_handle_info_command_without_section() {
    let env = TestEnv::new_master_server();

    let result = env
        .exec_command(
            TestUtils::invalid_command(&["info"]),
            &TestUtils::client_address(41844),
        )
        .await
        .unwrap();

    let redis_replica::commands::CommandResult::Response(response) = result else {
        panic!("Expected response, got {:?}", result);
    };
    assert!(response.contains("role:master"));
}
