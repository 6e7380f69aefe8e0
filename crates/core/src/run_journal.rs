use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::Local;

/// 运行日志行的级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for JournalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JournalLevel::Info => "INFO",
            JournalLevel::Warning => "WARNING",
            JournalLevel::Error => "ERROR",
        };
        f.write_str(s)
    }
}

const TRUNCATION_MARKER: &str = "... [log_data truncated]";

#[derive(Debug, Default)]
struct JournalInner {
    lines: Vec<String>,
    bytes: usize,
    truncated: bool,
    /// 终态行，不计入大小限制
    closing: Vec<String>,
}

/// 单次运行的诊断日志缓冲区
///
/// 每行格式为 `[YYYY-mm-dd HH:MM:SS] [LEVEL] message`，总大小受 `max_bytes` 限制，
/// 超出后丢弃后续行并在末尾追加截断标记。通过 [`RunJournal::conclude`] 写入的终态行
/// 不受限制，总是排在截断标记之后。可在适配器和执行器之间克隆共享。
#[derive(Debug, Clone)]
pub struct RunJournal {
    inner: Arc<Mutex<JournalInner>>,
    max_bytes: usize,
}

impl RunJournal {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(JournalInner::default())),
            max_bytes,
        }
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.append(JournalLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.append(JournalLevel::Warning, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.append(JournalLevel::Error, message.as_ref());
    }

    pub fn append(&self, level: JournalLevel, message: &str) {
        let line = format_line(level, message);

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.truncated {
            return;
        }
        // 换行符也计入大小
        let needed = line.len() + usize::from(!inner.lines.is_empty());
        if inner.bytes + needed > self.max_bytes {
            inner.truncated = true;
            return;
        }
        inner.bytes += needed;
        inner.lines.push(line);
    }

    /// 写入运行结论，截断后仍会保留
    pub fn conclude(&self, level: JournalLevel, message: &str) {
        let line = format_line(level, message);
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .closing
            .push(line);
    }

    /// 输出为 log_data 文本，空日志返回 None
    pub fn render(&self) -> Option<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut lines: Vec<&str> = inner.lines.iter().map(String::as_str).collect();
        if inner.truncated {
            lines.push(TRUNCATION_MARKER);
        }
        lines.extend(inner.closing.iter().map(String::as_str));

        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }
}

fn format_line(level: JournalLevel, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
    format!("[{timestamp}] [{level}] {message}")
}
