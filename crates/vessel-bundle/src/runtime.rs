//! Container runtime seam
//!
//! A [`Runtime`] receives an unpacked bundle directory and runs it to
//! completion. [`CommandRuntime`] shells out to an OCI runtime binary
//! (`runc`, `crun`, ...); tests substitute their own implementation.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

pub trait Runtime: Send + Sync {
    /// Run the bundle in `bundle_dir` under `container_id` and return the
    /// process exit code.
    fn run(&self, bundle_dir: &Path, container_id: &str) -> io::Result<i32>;
}

impl<T: Runtime + ?Sized> Runtime for Box<T> {
    fn run(&self, bundle_dir: &Path, container_id: &str) -> io::Result<i32> {
        (**self).run(bundle_dir, container_id)
    }
}

/// Invokes `<program> [global args] run -b <bundle_dir> <container_id>`.
#[derive(Clone, Debug)]
pub struct CommandRuntime {
    program: OsString,
    global_args: Vec<OsString>,
    inherit_stdio: bool,
}

impl CommandRuntime {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            global_args: Vec::new(),
            inherit_stdio: true,
        }
    }

    pub fn runc() -> Self {
        Self::new("runc")
    }

    /// Arguments placed before the `run` subcommand (e.g. `--root /run/vessel`).
    pub fn with_global_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.global_args.push(arg.into());
        self
    }

    /// Discard the container's stdio instead of attaching it to ours.
    pub fn quiet(mut self) -> Self {
        self.inherit_stdio = false;
        self
    }

    fn command(&self, bundle_dir: &Path, container_id: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.global_args)
            .arg("run")
            .arg("-b")
            .arg(bundle_dir)
            .arg(container_id);
        if !self.inherit_stdio {
            cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }
}

impl Runtime for CommandRuntime {
    fn run(&self, bundle_dir: &Path, container_id: &str) -> io::Result<i32> {
        debug!(program = ?self.program, container_id, "spawning runtime");
        let status = self.command(bundle_dir, container_id).status()?;
        match status.code() {
            Some(code) => {
                if code != 0 {
                    warn!(container_id, code, "runtime exited with failure");
                }
                Ok(code)
            }
            None => Err(io::Error::other(format!("runtime terminated by signal: {status}"))),
        }
    }
}
