//! Reporting to the host automation environment.
//!
//! Follows the GitHub Actions workflow-command conventions: step outputs are
//! appended to the file named by `GITHUB_OUTPUT` (falling back to the legacy
//! `::set-output` command), failures are announced with `::error::`.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Environment variable naming the step output file.
pub const OUTPUT_FILE_ENV: &str = "GITHUB_OUTPUT";

#[derive(Debug, Clone, Default)]
pub struct ActionsReporter {
    output_file: Option<PathBuf>,
}

impl ActionsReporter {
    pub fn new(output_file: Option<PathBuf>) -> Self {
        Self { output_file }
    }

    /// Reads the output file location from `GITHUB_OUTPUT`.
    pub fn from_env() -> Self {
        let output_file = std::env::var_os(OUTPUT_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(output_file)
    }

    /// Publishes a step output.
    ///
    /// With an output file the value is appended as a heredoc block, so it
    /// may span lines. Otherwise a `::set-output` command goes to `stdout`.
    pub fn set_output(&self, stdout: &mut impl Write, name: &str, value: &str) -> io::Result<()> {
        match &self.output_file {
            Some(path) => {
                let block = heredoc_block(name, value)?;
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(block.as_bytes())
            }
            None => writeln!(
                stdout,
                "::set-output name={}::{}",
                escape_property(name),
                escape_data(value)
            ),
        }
    }
}

/// Announces a failed run: `::error::` on `stdout`, the plain message on
/// `stderr`.
pub fn set_failed(stdout: &mut impl Write, stderr: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(stdout, "::error::{}", escape_data(message))?;
    writeln!(stderr, "{message}")
}

fn heredoc_block(name: &str, value: &str) -> io::Result<String> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let delimiter = format!("ghadelimiter_{nanos:032x}");

    if name.contains(&delimiter) || value.contains(&delimiter) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("output value contains the delimiter {delimiter}"),
        ));
    }
    Ok(format!("{name}<<{delimiter}\n{value}\n{delimiter}\n"))
}

/// Escapes a command message: `%`, CR and LF.
pub fn escape_data(s: &str) -> String {
    s.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escapes a command property, which additionally reserves `:` and `,`.
fn escape_property(s: &str) -> String {
    escape_data(s).replace(':', "%3A").replace(',', "%2C")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_data() {
        assert_eq!(escape_data("50% done\r\nnext"), "50%25 done%0D%0Anext");
        assert_eq!(escape_data("plain"), "plain");
    }

    #[test]
    fn test_set_failed_writes_both_streams() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        set_failed(&mut stdout, &mut stderr, "HTTP 404 Not Found").unwrap();
        assert_eq!(String::from_utf8(stdout).unwrap(), "::error::HTTP 404 Not Found\n");
        assert_eq!(String::from_utf8(stderr).unwrap(), "HTTP 404 Not Found\n");
    }

    #[test]
    fn test_set_output_without_file_uses_command() {
        let mut stdout = Vec::new();
        ActionsReporter::new(None)
            .set_output(&mut stdout, "feed", "{\n  \"a\": 1\n}")
            .unwrap();
        assert_eq!(
            String::from_utf8(stdout).unwrap(),
            "::set-output name=feed::{%0A  \"a\": 1%0A}\n"
        );
    }

    #[test]
    fn test_set_output_appends_heredoc() {
        let dir = std::env::temp_dir().join("feedsnap_host_output");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("output");
        std::fs::write(&path, "earlier=1\n").unwrap();

        let mut stdout = Vec::new();
        let reporter = ActionsReporter::new(Some(path.clone()));
        reporter.set_output(&mut stdout, "feed", "line1\nline2").unwrap();
        assert!(stdout.is_empty());

        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();
        assert_eq!(lines.next(), Some("earlier=1"));
        let header = lines.next().unwrap();
        let delimiter = header.strip_prefix("feed<<").unwrap();
        assert!(delimiter.starts_with("ghadelimiter_"));
        assert_eq!(lines.next(), Some("line1"));
        assert_eq!(lines.next(), Some("line2"));
        assert_eq!(lines.next(), Some(delimiter));
        assert_eq!(lines.next(), None);

        std::fs::remove_dir_all(&dir).ok();
    }
}
