// File: agent/src/services/commands.rs
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::AgentError;
use crate::types::CommandLine;

/// Output of a command that exited successfully.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

pub async fn execute_command(command: &CommandLine) -> Result<CommandOutput, AgentError> {
    debug!("Executing command: {}", command);

    let output = AsyncCommand::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| AgentError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if output.status.success() {
        Ok(CommandOutput { stdout, stderr })
    } else {
        let error_msg = if !stderr.trim().is_empty() { stderr } else { stdout };
        Err(AgentError::Failed {
            command: command.to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: error_msg.trim().to_string(),
        })
    }
}

/// Runs `producer | consumer`, streaming the producer's stdout into the consumer's stdin.
///
/// Both processes are always reaped. The consumer's failure is reported first since a
/// receiver that bails out early also breaks the producer's pipe.
pub async fn execute_pipeline(
    producer: &CommandLine,
    consumer: &CommandLine,
) -> Result<u64, AgentError> {
    debug!("Executing pipeline: {} | {}", producer, consumer);

    let mut send = AsyncCommand::new(&producer.program)
        .args(&producer.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AgentError::Spawn {
            command: producer.to_string(),
            source,
        })?;

    let mut recv = AsyncCommand::new(&consumer.program)
        .args(&consumer.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AgentError::Spawn {
            command: consumer.to_string(),
            source,
        })?;

    let pipe_error = |source: std::io::Error| AgentError::Pipe {
        producer: producer.to_string(),
        consumer: consumer.to_string(),
        source,
    };

    let mut stream = send
        .stdout
        .take()
        .ok_or_else(|| pipe_error(std::io::Error::other("producer stdout not captured")))?;
    let mut sink = recv
        .stdin
        .take()
        .ok_or_else(|| pipe_error(std::io::Error::other("consumer stdin not captured")))?;

    // Drain side streams continuously so neither process stalls on a full pipe
    let send_stderr = drain_lines(send.stderr.take(), "send");
    let recv_stderr = drain_lines(recv.stderr.take(), "recv");
    let recv_stdout = drain_lines(recv.stdout.take(), "recv");

    let copied = tokio::io::copy(&mut stream, &mut sink).await;
    drop(sink);
    drop(stream);

    let send_status = send.wait().await.map_err(pipe_error)?;
    let recv_status = recv.wait().await.map_err(pipe_error)?;

    let send_stderr = send_stderr.await.unwrap_or_default();
    let recv_stderr = recv_stderr.await.unwrap_or_default();
    let recv_stdout = recv_stdout.await.unwrap_or_default();

    if !recv_status.success() {
        let message = if recv_stderr.trim().is_empty() {
            recv_stdout
        } else {
            recv_stderr
        };
        return Err(AgentError::Failed {
            command: consumer.to_string(),
            status: recv_status.code().unwrap_or(-1),
            stderr: message.trim().to_string(),
        });
    }

    if !send_status.success() {
        return Err(AgentError::Failed {
            command: producer.to_string(),
            status: send_status.code().unwrap_or(-1),
            stderr: send_stderr.trim().to_string(),
        });
    }

    let bytes = copied.map_err(pipe_error)?;
    info!("Pipeline completed: {} bytes streamed", bytes);
    Ok(bytes)
}

fn drain_lines<R>(stream: Option<R>, label: &'static str) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut collected = String::new();
        let Some(stream) = stream else {
            return collected;
        };

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while let Ok(bytes_read) = reader.read_line(&mut line).await {
            if bytes_read == 0 {
                break;
            }
            debug!("{}: {}", label, line.trim_end());
            collected.push_str(&line);
            line.clear();
        }
        collected
    })
}
