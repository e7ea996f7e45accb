//! Platform-specific output port defaults and setup hints.
//!
//! The only place where the companion knows which loopback MIDI driver a
//! given operating system usually provides.

/// Output port searched for when the config does not name one
#[cfg(target_os = "windows")]
pub fn default_output_port() -> &'static str {
    "LoopBe Internal MIDI"
}

/// Output port searched for when the config does not name one
#[cfg(target_os = "macos")]
pub fn default_output_port() -> &'static str {
    "IAC Driver Bus 1"
}

/// Output port searched for when the config does not name one
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn default_output_port() -> &'static str {
    "Midi Through"
}

/// Instructions shown when the output port cannot be found
#[cfg(target_os = "windows")]
pub fn setup_instructions() -> Vec<&'static str> {
    vec![
        "To use this app, the LoopBe1 virtual MIDI device must be installed and enabled.",
        "Download it from https://www.nerds.de/data/setuploopbe1.exe and restart the companion.",
    ]
}

/// Instructions shown when the output port cannot be found
#[cfg(target_os = "macos")]
pub fn setup_instructions() -> Vec<&'static str> {
    vec![
        "To use this app, the IAC Driver must be enabled:",
        "1. Open the 'Audio MIDI Setup' application (Spotlight, or Applications > Utilities).",
        "2. In the menu bar select 'Window' -> 'Show MIDI Studio'.",
        "3. Double-click the 'IAC Driver' icon to open its properties.",
        "4. Check 'Device is online'.",
    ]
}

/// Instructions shown when the output port cannot be found
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub fn setup_instructions() -> Vec<&'static str> {
    vec![
        "No matching MIDI output port was found.",
        "Load the ALSA loopback module (`sudo modprobe snd-virmidi`) or run with --virtual-port.",
    ]
}

/// Whether a port name looks like a software loopback rather than hardware
pub fn is_virtual_port_name(name: &str) -> bool {
    ["Virtual", "loopMIDI", "LoopBe", "IAC", "Through", "VirMIDI"]
        .iter()
        .any(|marker| name.to_lowercase().contains(&marker.to_lowercase()))
}

/// Installer opened when the user gives up waiting for the port
#[cfg(target_os = "windows")]
pub fn setup_download_url() -> Option<&'static str> {
    Some("https://www.nerds.de/data/setuploopbe1.exe")
}

/// Installer opened when the user gives up waiting for the port
#[cfg(not(target_os = "windows"))]
pub fn setup_download_url() -> Option<&'static str> {
    None
}

/// Program and arguments that hand `url` to the desktop's default handler
pub fn open_command(url: &str) -> (&'static str, Vec<String>) {
    if cfg!(target_os = "windows") {
        // Empty title argument, otherwise `start` treats a quoted URL as the title
        ("cmd", vec!["/C".into(), "start".into(), String::new(), url.into()])
    } else if cfg!(target_os = "macos") {
        ("open", vec![url.into()])
    } else {
        ("xdg-open", vec![url.into()])
    }
}

/// Open `url` with the default handler without waiting for it
pub fn open_url(url: &str) -> std::io::Result<()> {
    let (program, args) = open_command(url);
    std::process::Command::new(program).args(args).spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_recognised_as_virtual() {
        assert!(is_virtual_port_name(default_output_port()));
    }

    #[test]
    fn test_hardware_port_is_not_virtual() {
        assert!(!is_virtual_port_name("X-Touch"));
        assert!(is_virtual_port_name("loopmidi port 1"));
    }

    #[test]
    fn test_instructions_are_not_empty() {
        assert!(!setup_instructions().is_empty());
    }

    #[test]
    fn test_open_command_passes_url_last() {
        let url = "https://example.com/setup.exe";
        let (program, args) = open_command(url);

        assert!(!program.is_empty());
        assert_eq!(args.last().map(String::as_str), Some(url));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_no_installer_outside_windows() {
        assert_eq!(setup_download_url(), None);
    }
}
