//! Small process-related helpers shared across the workspace.

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Upper bound on the stderr bytes kept from a child process.
///
/// Only the tail is retained; transcoders report the actual failure last.
pub const MAX_CAPTURED_STDERR: usize = 64 * 1024;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<std::ffi::OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Exit status of a finished child plus the tail of what it wrote to stderr.
#[cfg(feature = "tokio")]
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: std::process::ExitStatus,
    pub stderr: String,
}

/// Spawn `command`, wait for it to exit and collect its stderr.
///
/// Stdin and stdout are discarded. Stderr is drained while the child runs so a
/// chatty process cannot stall on a full pipe. The child is killed if the
/// returned future is dropped before it completes.
#[cfg(feature = "tokio")]
pub async fn run_capturing_stderr(
    command: &mut tokio::process::Command,
) -> std::io::Result<CapturedOutput> {
    use std::process::Stdio;

    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn()?;
    let stderr = child.stderr.take();

    let collect = async move {
        match stderr {
            Some(pipe) => read_tail(pipe, MAX_CAPTURED_STDERR).await,
            None => Ok(String::new()),
        }
    };

    let (status, stderr) = tokio::join!(child.wait(), collect);

    Ok(CapturedOutput {
        status: status?,
        stderr: stderr?,
    })
}

/// Read `reader` to EOF, keeping at most the last `limit` bytes.
#[cfg(feature = "tokio")]
pub async fn read_tail<R>(mut reader: R, limit: usize) -> std::io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    use tokio::io::AsyncReadExt;

    let mut tail = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        tail.extend_from_slice(&buf[..n]);
        if tail.len() > limit {
            let excess = tail.len() - limit;
            tail.drain(..excess);
        }
    }

    Ok(String::from_utf8_lossy(&tail).into_owned())
}
