//! Races several `native-format install` processes for one cache entry and
//! drives `native-format format` end to end.

use camino::Utf8Path;
use color_eyre::eyre::{Result, ensure};
use native_format_cache::test_support::utf8_temp_dir;
use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_native-format");
const PAYLOAD: &[u8] = b"BINARYDATA";

fn native_format() -> Command {
    let mut command = Command::new(BIN);
    command
        .env_remove("NATIVE_FORMAT_CACHE_DIR")
        .env_remove("NATIVE_FORMAT_SOURCE")
        .env_remove("NATIVE_FORMAT_BINARY")
        .env_remove("NATIVE_FORMAT_TIMEOUT_SECS")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    command
}

fn install_command(source: &Utf8Path, dest: &Utf8Path) -> Command {
    let mut command = native_format();
    command.args(["install", "--source", source.as_str(), "--dest", dest.as_str()]);
    command
}

fn stdout_of(output: &Output) -> Result<String> {
    ensure!(
        output.status.success(),
        "native-format failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8(output.stdout.clone())?)
}

#[test]
fn racing_processes_all_report_one_complete_entry() -> Result<()> {
    let (_dir, root) = utf8_temp_dir()?;
    fs::create_dir_all(root.join("downloads"))?;
    let source = root.join("downloads/formatter-2.50.0.bin");
    fs::write(&source, PAYLOAD)?;
    let dest = root.join("cache/native-format/formatter-2.50.0.bin");

    let children = (0..8)
        .map(|_| install_command(&source, &dest).spawn())
        .collect::<std::io::Result<Vec<_>>>()?;
    let mut printed = Vec::new();
    for child in children {
        printed.push(stdout_of(&child.wait_with_output()?)?);
    }

    for line in &printed {
        assert_eq!(line.trim_end(), dest.as_str());
    }
    assert_eq!(fs::read(&dest)?, PAYLOAD);

    let mut entries = fs::read_dir(dest.parent().unwrap_or(&root))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    assert_eq!(
        entries,
        ["formatter-2.50.0.bin", "formatter-2.50.0.bin.lock"]
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn installed_binary_is_made_executable() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, root) = utf8_temp_dir()?;
    let source = root.join("formatter.bin");
    fs::write(&source, PAYLOAD)?;
    fs::set_permissions(&source, fs::Permissions::from_mode(0o644))?;
    let dest = root.join("cache/formatter.bin");

    stdout_of(&install_command(&source, &dest).output()?)?;

    let mode = fs::metadata(&dest)?.permissions().mode();
    assert_eq!(mode & 0o111, 0o111);
    Ok(())
}

#[test]
fn install_uses_the_configured_cache_root() -> Result<()> {
    let (_dir, root) = utf8_temp_dir()?;
    let source = root.join("formatter-2.50.0.bin");
    fs::write(&source, PAYLOAD)?;
    let cache = root.join("cache");

    let output = native_format()
        .args(["install", "--source", source.as_str()])
        .env("NATIVE_FORMAT_CACHE_DIR", cache.as_str())
        .output()?;

    let expected = cache.join("formatter-2.50.0.bin");
    assert_eq!(stdout_of(&output)?.trim_end(), expected.as_str());
    assert_eq!(fs::read(&expected)?, PAYLOAD);
    Ok(())
}

#[test]
fn missing_source_fails_with_status_one() -> Result<()> {
    let (_dir, root) = utf8_temp_dir()?;
    let output = install_command(&root.join("absent.bin"), &root.join("cache/absent.bin"))
        .output()?;

    assert_eq!(output.status.code(), Some(1));
    assert!(!root.join("cache/absent.bin").exists());
    Ok(())
}

#[cfg(unix)]
#[test]
fn format_pipes_stdin_through_the_installed_binary() -> Result<()> {
    use native_format_cache::test_support::write_fake_formatter;

    let (_dir, root) = utf8_temp_dir()?;
    let binary = write_fake_formatter(&root, "formatter.bin", "tr 'a-z' 'A-Z'")?;

    let mut child = native_format()
        .args(["format", "--binary", binary.as_str()])
        .stdin(Stdio::piped())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(b"class a {}")?;
    }
    let output = child.wait_with_output()?;

    assert_eq!(stdout_of(&output)?, "CLASS A {}");
    Ok(())
}

#[cfg(unix)]
#[test]
fn format_prints_replacements_as_json() -> Result<()> {
    use native_format_cache::test_support::write_fake_formatter;

    let (_dir, root) = utf8_temp_dir()?;
    let binary = write_fake_formatter(
        &root,
        "formatter.bin",
        r#"cat > /dev/null
printf '[{"range":{"start":7,"end":7},"replacement":" "}]'"#,
    )?;
    let document = root.join("A.java");
    fs::write(&document, "class A{int x;}")?;

    let output = native_format()
        .args([
            "format",
            "--binary",
            binary.as_str(),
            "--ranges",
            "0:15",
            "--replacements",
            document.as_str(),
        ])
        .output()?;

    let printed: serde_json::Value = serde_json::from_str(&stdout_of(&output)?)?;
    assert_eq!(
        printed,
        serde_json::json!([{"range": {"start": 7, "end": 7}, "replacement": " "}])
    );
    Ok(())
}
