//! Writing records to a byte stream, one per line.

use amqp_tap::Record;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Newline-delimited record writer. Flushes after every record so output
/// shows up immediately when piped.
pub struct RecordWriter<W: AsyncWrite + Unpin> {
    inner: BufWriter<W>,
    written: usize,
}

impl<W: AsyncWrite + Unpin> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            written: 0,
        }
    }

    /// Write one record. Absent selections produce an empty line.
    pub async fn write(&mut self, record: &Record) -> io::Result<()> {
        let line = record.to_string();
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\n").await?;
        self.inner.flush().await?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub async fn finish(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    #[cfg(test)]
    fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_are_newline_delimited() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write(&Record::Text("Hello, World!".into())).await.unwrap();
        writer.write(&Record::Absent).await.unwrap();
        writer
            .write(&Record::Object(json!({"hello": "world!"})))
            .await
            .unwrap();
        writer.finish().await.unwrap();

        let output = String::from_utf8(writer.get_ref().clone()).unwrap();
        assert_eq!(output, "Hello, World!\n\n{\"hello\":\"world!\"}\n");
        assert_eq!(writer.written(), 3);
    }

    #[tokio::test]
    async fn test_multiline_records_are_kept_whole() {
        let mut writer = RecordWriter::new(Vec::new());
        writer.write(&Record::Text("{\n  a: 1\n}".into())).await.unwrap();

        let output = String::from_utf8(writer.get_ref().clone()).unwrap();
        assert_eq!(output, "{\n  a: 1\n}\n");
    }
}
