use redis_replica::commands::CommandResult;
use tokio::sync::mpsc;

use crate::test_utils::{TestEnv, TestUtils};

#[tokio::test]
async fn test_handle_replconf_command() {
    let env = TestEnv::new_master_server();

    let test_cases = vec![
        vec!["listening-port", "6380"],
        vec!["capa", "psync2"],
        vec!["capa", "eof", "capa", "psync2"],
    ];

    for arguments in test_cases {
        env.exec_command_immediate_success_response(
            TestUtils::replconf_command(&arguments),
            &TestUtils::client_address(41844),
            &TestUtils::expected_simple_string("OK"),
        )
        .await;
    }
}

#[tokio::test]
async fn test_handle_replconf_ack_records_offset() {
    let env = TestEnv::new_master_server();
    let replica_address = TestUtils::client_address(50000);
    let (sender, _receiver) = mpsc::channel(8);
    env.state
        .replicas
        .register(replica_address.clone(), sender)
        .await;

    let result = env
        .exec_command(
            TestUtils::replconf_command(&["ACK", "154"]),
            &replica_address,
        )
        .await;

    assert_eq!(result, Ok(CommandResult::NoResponse));
    assert_eq!(
        env.state.replicas.acked_offsets().await,
        vec![(replica_address, 154)]
    );
}

#[tokio::test]
async fn test_handle_replconf_ack_with_invalid_offset() {
    let env = TestEnv::new_master_server();

    for arguments in [vec!["ack"], vec!["ACK", "lots"]] {
        let result = env
            .exec_command(
                TestUtils::replconf_command(&arguments),
                &TestUtils::client_address(41844),
            )
            .await;

        assert_eq!(result, Ok(CommandResult::NoResponse), "{:?}", arguments);
    }
}

#[tokio::test]
async fn test_handle_replconf_getack_from_master() {
    let env = TestEnv::new_replica_server(6380);

    let result = env
        .exec_command_from_master(TestUtils::replconf_command(&["GETACK", "*"]))
        .await;
    assert_eq!(
        result,
        Ok(CommandResult::Response(
            "*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$1\r\n0\r\n".to_string()
        ))
    );

    env.state.offset.advance(37);

    let result = env
        .exec_command_from_master(TestUtils::replconf_command(&["GETACK", "*"]))
        .await;
    assert_eq!(
        result,
        Ok(CommandResult::Response(
            "*3\r\n$8\r\nREPLCONF\r\n$3\r\nACK\r\n$2\r\n37\r\n".to_string()
        ))
    );
}

#[tokio::test]
async fn test_commands_from_master_are_applied_silently() {
    let env = TestEnv::new_replica_server(6380);

    let test_cases = vec![
        TestUtils::set_command("k", "v"),
        TestUtils::ping_command(),
        TestUtils::get_command("k"),
        TestUtils::echo_command("hi"),
    ];

    for command in test_cases {
        assert_eq!(
            env.exec_command_from_master(command).await,
            Ok(CommandResult::NoResponse)
        );
    }

    assert_eq!(env.store.get("k").await, Some("v".to_string()));
}
