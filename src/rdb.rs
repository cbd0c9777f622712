use tokio::io::{AsyncWrite, AsyncWriteExt};

/// An empty RDB image. Full resyncs always send this: the store is never persisted, so
/// the replica starts empty and converges through the propagated command stream.
const EMPTY_RDB_HEX: &str = "524544495330303131fa0972656469732d76657205372e322e30fa0a72656469732d62697473c040fa056374696d65c26d08bc65fa08757365642d6d656dc2b0c41000fa08616f662d62617365c000fff06e3bfec0ff5aa2";

pub fn empty_rdb() -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(EMPTY_RDB_HEX)
}

/// Writes the full-resync snapshot as `$<len>\r\n<bytes>`, without a trailing CRLF.
pub async fn write_snapshot<W>(writer: &mut W) -> tokio::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let snapshot = empty_rdb()
        .map_err(|e| tokio::io::Error::new(tokio::io::ErrorKind::InvalidData, e))?;

    writer
        .write_all(format!("${}\r\n", snapshot.len()).as_bytes())
        .await?;
    writer.write_all(&snapshot).await?;

    Ok(())
}
