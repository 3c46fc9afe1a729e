use std::{
    io::{self, Cursor, Write},
    process::{Command, Stdio},
    thread,
};

use image::ImageFormat;

use super::{Frame, RecognitionError, TextRecognizer};

/// Runs an external OCR program per frame.
///
/// The frame is piped to the program's stdin as PNG and its trimmed stdout is
/// taken as the recognized text. The default invocation is
/// `tesseract stdin stdout`.
#[derive(Debug, Clone)]
pub struct CommandRecognizer {
    program: String,
    args: Vec<String>,
}

impl CommandRecognizer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for CommandRecognizer {
    fn default() -> Self {
        Self::new("tesseract", vec!["stdin".into(), "stdout".into()])
    }
}

impl TextRecognizer for CommandRecognizer {
    fn recognize(&self, frame: &Frame) -> Result<String, RecognitionError> {
        let mut png = Vec::new();
        frame
            .image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stdin is fed from its own thread while stdout and stderr drain here,
        // otherwise a chatty program can fill a pipe and stall both sides.
        let stdin = child.stdin.take();
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(&png),
                None => Ok(()),
            });
            let output = child.wait_with_output();
            (output, writer.join())
        });

        let output = output?;
        match written {
            Ok(Ok(())) => {}
            // the program may exit without reading the whole frame
            Ok(Err(err)) if err.kind() == io::ErrorKind::BrokenPipe => {}
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => return Err(RecognitionError::Engine("stdin writer panicked".into())),
        }

        if !output.status.success() {
            return Err(RecognitionError::Engine(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
