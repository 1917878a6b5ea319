//! 终端人工输入 ISBN

use crate::error::{AppError, AppResult};
use crate::services::ports::IsbnPrompt;
use async_trait::async_trait;
use tokio::io::{stdin, stdout, AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

/// 从标准输入读取一行
///
/// 提问期间整个运行会暂停（ISBN 阶段本身是串行的）
pub struct StdinIsbnPrompt {
    reader: Mutex<BufReader<Stdin>>,
}

impl StdinIsbnPrompt {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(stdin())),
        }
    }
}

impl Default for StdinIsbnPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IsbnPrompt for StdinIsbnPrompt {
    async fn ask(&self, title: &str) -> AppResult<Option<String>> {
        let mut reader = self.reader.lock().await;

        let question = format!(
            "\n未找到《{}》的 ISBN，请手动输入（直接回车跳过）:\nISBN: ",
            title
        );
        let mut out = stdout();
        out.write_all(question.as_bytes()).await.map_err(AppError::from)?;
        out.flush().await.map_err(AppError::from)?;

        let mut line = String::new();
        // 读到 EOF（非交互环境）时当作跳过
        let read = reader.read_line(&mut line).await.map_err(AppError::from)?;
        if read == 0 {
            return Ok(None);
        }

        let answer = line.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}
