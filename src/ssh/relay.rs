// ABOUTME: Interactive relay for remote output that may ask for a secret.
// ABOUTME: Byte-level line scanner that logs completed lines and answers registered prompts once per occurrence.

use async_trait::async_trait;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

/// A prompt the remote side may print, and the secret that answers it.
///
/// The in-progress line matches when it starts with `prefix` and ends with `suffix`.
pub struct Prompt {
    prefix: String,
    suffix: String,
    secret: Zeroizing<String>,
}

impl Prompt {
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        secret: Zeroizing<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            secret,
        }
    }

    /// The sudo elevation prompt, e.g. `[sudo] password for deploy: `.
    pub fn sudo(secret: Zeroizing<String>) -> Self {
        Self::new("[sudo] password for ", ": ", secret)
    }

    fn matches(&self, line: &[u8]) -> bool {
        line.len() >= self.prefix.len() + self.suffix.len()
            && line.starts_with(self.prefix.as_bytes())
            && line.ends_with(self.suffix.as_bytes())
    }

    fn response(&self) -> Zeroizing<Vec<u8>> {
        let mut bytes = Zeroizing::new(Vec::with_capacity(self.secret.len() + 1));
        bytes.extend_from_slice(self.secret.as_bytes());
        bytes.push(b'\n');
        bytes
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ReadingLine,
    LineComplete,
    PromptMatched,
}

/// What the scanner wants done after consuming one byte.
#[derive(Debug, PartialEq, Eq)]
pub enum ScanEvent {
    /// Nothing to do yet.
    Continue,
    /// A full line was read (trailing `\r` removed).
    Line(String),
    /// The registered prompt at this index matched the current line.
    Respond(usize),
}

/// Line-buffering state machine over the remote output.
#[derive(Debug)]
pub struct PromptScanner<'a> {
    prompts: &'a [Prompt],
    line: Vec<u8>,
    state: ScanState,
}

impl<'a> PromptScanner<'a> {
    pub fn new(prompts: &'a [Prompt]) -> Self {
        Self {
            prompts,
            line: Vec::new(),
            state: ScanState::ReadingLine,
        }
    }

    pub fn feed(&mut self, byte: u8) -> ScanEvent {
        if self.state == ScanState::LineComplete {
            self.line.clear();
            self.state = ScanState::ReadingLine;
        }

        if byte == b'\n' {
            self.state = ScanState::LineComplete;
            let mut line = String::from_utf8_lossy(&self.line).into_owned();
            if line.ends_with('\r') {
                line.pop();
            }
            return ScanEvent::Line(line);
        }

        self.line.push(byte);

        // One answer per prompt occurrence; the next line may prompt again.
        if self.state == ScanState::PromptMatched {
            return ScanEvent::Continue;
        }
        match self.prompts.iter().position(|p| p.matches(&self.line)) {
            Some(index) => {
                self.state = ScanState::PromptMatched;
                ScanEvent::Respond(index)
            }
            None => ScanEvent::Continue,
        }
    }

    /// Bytes of the unterminated last line, if any.
    pub fn pending(&self) -> Option<String> {
        (self.state != ScanState::LineComplete && !self.line.is_empty())
            .then(|| String::from_utf8_lossy(&self.line).into_owned())
    }
}

/// Where prompt answers are written: the remote command's input.
#[async_trait]
pub trait InputSink: Send {
    async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()>;
}

#[async_trait]
impl InputSink for Vec<u8> {
    async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

#[async_trait]
impl<T: InputSink + ?Sized> InputSink for &mut T {
    async fn send(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        (**self).send(bytes).await
    }
}

/// Result of relaying one command's output.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Every byte the remote side printed, in order.
    pub output: Vec<u8>,
    /// How many prompt answers were written.
    pub responses: usize,
}

/// Consume output chunks until the producer hangs up, answering prompts on the way.
///
/// A closed output stream is the normal end of the relay. A failed write to
/// `input` means the remote side is gone; scanning continues so the remaining
/// output is still logged, but no further answers are attempted.
pub async fn scan<S: InputSink>(
    host: &str,
    mut output: mpsc::Receiver<Vec<u8>>,
    mut input: S,
    prompts: &[Prompt],
) -> Transcript {
    let mut scanner = PromptScanner::new(prompts);
    let mut transcript = Transcript::default();
    let mut input_open = true;

    while let Some(chunk) = output.recv().await {
        for &byte in &chunk {
            transcript.output.push(byte);
            match scanner.feed(byte) {
                ScanEvent::Continue => {}
                ScanEvent::Line(line) => tracing::info!(host, "{line}"),
                ScanEvent::Respond(index) if input_open => {
                    tracing::debug!(host, "answering remote prompt");
                    let response = prompts[index].response();
                    match input.send(&response).await {
                        Ok(()) => transcript.responses += 1,
                        Err(e) => {
                            tracing::debug!(host, error = %e, "remote input closed");
                            input_open = false;
                        }
                    }
                }
                ScanEvent::Respond(_) => {}
            }
        }
    }

    if let Some(rest) = scanner.pending() {
        tracing::info!(host, "{rest}");
    }
    transcript
}
