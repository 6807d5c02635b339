//! Emulator command line construction.

use crate::config::LaunchConfig;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use xqemu_shared::constants::qmp;

/// Program and argument vector for one emulator launch.
///
/// Arguments are kept as discrete elements and handed to the OS as such;
/// the `Display` rendering is for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<OsString>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Map a validated configuration onto xqemu's command line.
    ///
    /// The QMP listener is a TCP server on `localhost:<qmp_port>` that does
    /// not wait for a client before booting.
    pub fn build(config: &LaunchConfig, qmp_port: u16) -> Self {
        let mut machine = OsString::from("xbox,bootrom=");
        machine.push(config.mcpx_path());
        if config.short_anim() {
            machine.push(",short_animation");
        }

        let mut hdd = OsString::from("file=");
        hdd.push(config.hdd_path());
        hdd.push(",index=0,media=disk");
        if config.hdd_locked() {
            hdd.push(",locked");
        }

        let mut dvd = OsString::from("index=1,media=cdrom");
        if let Some(path) = config.dvd_path() {
            dvd.push(",file=");
            dvd.push(path);
        }

        let args = vec![
            "-cpu".into(),
            "pentium3".into(),
            "-machine".into(),
            machine,
            "-m".into(),
            "64".into(),
            "-bios".into(),
            config.flash_path().as_os_str().to_os_string(),
            "-net".into(),
            "nic,model=nvnet".into(),
            "-net".into(),
            "user".into(),
            "-drive".into(),
            hdd,
            "-drive".into(),
            dvd,
            "-qmp".into(),
            format!("tcp:{}:{},server,nowait", qmp::HOST, qmp_port).into(),
        ];

        Self {
            program: config.xqemu_path().to_path_buf(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(quote_for_display);

        for (i, part) in parts.enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(&part)?;
        }
        Ok(())
    }
}

fn quote_for_display(part: &OsStr) -> String {
    let part = part.to_string_lossy();
    if part.contains(' ') {
        format!("\"{}\"", part.replace('"', "\\\""))
    } else {
        part.into_owned()
    }
}
