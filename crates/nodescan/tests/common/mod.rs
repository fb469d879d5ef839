use std::{fs, path::Path};

use serde_json::Value;

/// Writes `files` below `root`, creating parent directories as needed.
pub fn write_fixture(root: &Path, files: &[(&str, Value)]) -> Result<(), anyhow::Error> {
    for (path, contents) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = match contents {
            Value::String(raw) => raw.clone(),
            value => serde_json::to_string_pretty(value)?,
        };
        fs::write(path, contents)?;
    }
    Ok(())
}

/// Runs the binary against `root` and parses its stdout.
#[macro_export]
macro_rules! scan_json {
    ($root:expr $(, $arg:expr)* $(,)?) => {{
        let output = assert_cmd::Command::cargo_bin("nodescan")?
            .arg("--cwd")
            .arg($root)
            $(.arg($arg))*
            .env_remove("NODESCAN_PACKAGE_MANAGER")
            .env_remove("NODESCAN_MANIFEST_KEY")
            .env_remove("NODESCAN_SIBLING_CONFIG_FILE")
            .env_remove("NODESCAN_PARALLEL")
            .output()?;
        let stdout = String::from_utf8(output.stdout)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        println!("stdout: {}", stdout);
        println!("stderr: {}", stderr);
        assert!(output.status.success());
        serde_json::from_str::<serde_json::Value>(&stdout)?
    }};
}
