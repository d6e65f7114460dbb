use crate::probe::ProbeError;
#[cfg(any(target_os = "windows", test))]
use serde_json::Value;
use std::process::{Command, Output};
use tracing::debug;

const STDERR_LIMIT: usize = 400;

pub(super) fn run_tool(program: &str, args: &[&str]) -> Result<String, ProbeError> {
    debug!(program, ?args, "running tool");
    let output = spawn(program, args)?;
    stdout_of(program, output)
}

fn spawn(program: &str, args: &[&str]) -> Result<Output, ProbeError> {
    match Command::new(program).args(args).output() {
        Ok(output) => Ok(output),
        #[cfg(target_os = "windows")]
        Err(_) => Command::new(format!(r"C:\Windows\System32\{program}.exe"))
            .args(args)
            .output()
            .map_err(|source| ProbeError::Spawn {
                program: program.to_string(),
                source,
            }),
        #[cfg(not(target_os = "windows"))]
        Err(source) => Err(ProbeError::Spawn {
            program: program.to_string(),
            source,
        }),
    }
}

#[cfg(target_os = "windows")]
pub(super) fn run_powershell(script: &str) -> Result<String, ProbeError> {
    let wrapped_script = format!(
        "$ErrorActionPreference='Stop'; [Console]::OutputEncoding=[System.Text.UTF8Encoding]::new($false); $OutputEncoding=[System.Text.UTF8Encoding]::new($false); {script}"
    );
    let args = ["-NoProfile", "-NonInteractive", "-Command", wrapped_script.as_str()];
    debug!(script, "running powershell");
    let output = match Command::new("powershell").args(args).output() {
        Ok(output) => output,
        Err(_) => Command::new(r"C:\Windows\System32\WindowsPowerShell\v1.0\powershell.exe")
            .args(args)
            .output()
            .map_err(|source| ProbeError::Spawn {
                program: "powershell".to_string(),
                source,
            })?,
    };
    stdout_of("powershell", output)
}

fn stdout_of(program: &str, output: Output) -> Result<String, ProbeError> {
    if !output.status.success() {
        let stderr: String = decode_cmd_stdout(&output.stderr)
            .trim()
            .chars()
            .take(STDERR_LIMIT)
            .collect();
        return Err(ProbeError::Command {
            program: program.to_string(),
            code: output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            stderr,
        });
    }
    Ok(decode_cmd_stdout(&output.stdout))
}

/// Windows tools answer in UTF-8, UTF-16LE or the OEM code page depending on
/// how they were launched.
pub(super) fn decode_cmd_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let u16buf: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}

/// `ConvertTo-Json` emits a bare object for one row and an array for many.
#[cfg(any(target_os = "windows", test))]
pub(super) fn json_rows(text: &str) -> Result<Vec<Value>, ProbeError> {
    let trimmed = text.trim().trim_start_matches('\u{feff}');
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|err| ProbeError::Parse(format!("invalid JSON: {err}")))?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(_) => Ok(vec![value]),
        Value::Null => Ok(Vec::new()),
        other => Err(ProbeError::Parse(format!("expected JSON rows, got {other}"))),
    }
}

#[cfg(any(target_os = "windows", test))]
pub(super) fn str_field(row: &Value, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(any(target_os = "windows", test))]
pub(super) fn f64_field(row: &Value, key: &str) -> Option<f64> {
    let value = match row.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_f64_loose(s),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

#[cfg(any(target_os = "windows", test))]
pub(super) fn u64_field(row: &Value, key: &str) -> Option<u64> {
    f64_field(row, key).map(|v| if v < 0.0 { 0 } else { v as u64 })
}

#[cfg(any(target_os = "windows", test))]
pub(super) fn bool_field(row: &Value, key: &str) -> Option<bool> {
    match row.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(any(target_os = "windows", test))]
pub(super) fn parse_f64_loose(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some(v);
    }

    if let Ok(v) = trimmed.replace(',', ".").parse::<f64>() {
        return Some(v);
    }

    let filtered: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(*c, '.' | ',' | 'e' | 'E' | '-' | '+'))
        .collect();
    if filtered.is_empty() {
        return None;
    }

    filtered.replace(',', ".").parse::<f64>().ok()
}
