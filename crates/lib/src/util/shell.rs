//! Shell selection for step and generator commands.

/// Shell binary and the arguments that precede the command string.
///
/// Always `/bin/sh -c` on Unix and `powershell.exe` on Windows. `$SHELL` is
/// ignored since interactive shells source profiles that alter the
/// environment.
pub fn system_shell() -> (&'static str, &'static [&'static str]) {
  #[cfg(unix)]
  {
    ("/bin/sh", &["-c"])
  }

  #[cfg(windows)]
  {
    ("powershell.exe", &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command"])
  }
}
