use crate::error::{Result, RuntimeError};
use async_trait::async_trait;
use tracing::debug;

/// Output from a command execution
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Something that can run an external administration program
///
/// `SystemRunner` spawns real processes. Tests substitute a runner that
/// replays captured tool output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and return its output regardless of exit code
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs programs with `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!("Executing: {}", command_line(program, args));

        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                RuntimeError::command_failed(command_line(program, args), -1, e.to_string())
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        debug!(
            "Command exited with code {}: {}",
            exit_code,
            command_line(program, args)
        );

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Program path plus joined arguments, as reported in failures
pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Split stdout into lines, dropping the trailing blank line tools emit
pub fn output_lines(stdout: &str) -> Vec<String> {
    let mut lines: Vec<String> = stdout.split('\n').map(str::to_string).collect();
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

/// Run a program, fail on non-zero exit, and return its output lines
pub async fn invoke(runner: &dyn CommandRunner, program: &str, args: &[String]) -> Result<Vec<String>> {
    let output = runner.run(program, args).await?;

    if output.exit_code != 0 {
        return Err(RuntimeError::command_failed(
            command_line(program, args),
            output.exit_code,
            output.stderr,
        ));
    }

    Ok(output_lines(&output.stdout))
}

/// Build an owned argument vector from string slices
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[test]
    fn test_output_lines_drops_trailing_blank() {
        assert_eq!(output_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(output_lines("a\nb"), vec!["a", "b"]);
        assert!(output_lines("").is_empty());
        assert_eq!(output_lines("a\n\n"), vec!["a", ""]);
    }

    #[test]
    fn test_command_line() {
        assert_eq!(
            command_line("zfs", &args(["list", "-H"])),
            "zfs list -H"
        );
        assert_eq!(command_line("stmfadm", &[]), "stmfadm");
    }

    #[tokio::test]
    async fn test_invoke_reports_failure_with_stderr() {
        let runner = ScriptedRunner::new();
        runner.push_failure(1, "cannot open 'tank/x': dataset does not exist\n");

        let err = invoke(&runner, "zfs", &args(["get", "all", "tank/x"]))
            .await
            .unwrap_err();
        match err {
            RuntimeError::CommandFailed {
                command,
                exit_code,
                stderr,
            } => {
                assert_eq!(command, "zfs get all tank/x");
                assert_eq!(exit_code, 1);
                assert!(stderr.contains("does not exist"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_invoke_returns_lines() {
        let runner = ScriptedRunner::new();
        runner.push_output("tank\tfilesystem\ntank/a\tvolume\n");
        let lines = invoke(&runner, "zfs", &args(["list"])).await.unwrap();
        assert_eq!(lines, vec!["tank\tfilesystem", "tank/a\tvolume"]);
        assert_eq!(runner.calls(), vec!["zfs list"]);
    }

    #[tokio::test]
    async fn test_system_runner_spawn_failure() {
        let err = SystemRunner
            .run("/nonexistent/lunar-test-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::CommandFailed { exit_code: -1, .. }));
    }
}
