use std::{env, io::Write};

use eyre::{eyre, Result};

/// build a standardized output path for the given parameters. follows the following cases:
/// - if `output` is the default value (`output`), return `{cwd}/output/{module}/{filename}`,
///   where `module` is the target's file stem, or `local` for inline modules
/// - if `output` is specified, return `{output}/{filename}`
pub(crate) fn build_output_path(output: &str, target: &str, filename: &str) -> Result<String> {
    if output == "output" {
        let cwd = env::current_dir()?
            .into_os_string()
            .into_string()
            .map_err(|_| eyre!("Unable to get current working directory"))?;

        let module = std::path::Path::new(target)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|_| !target.trim_start().starts_with('{'))
            .unwrap_or("local");

        return Ok(format!("{cwd}/output/{module}/{filename}"));
    }

    Ok(format!("{}/{}", output.trim_end_matches('/'), filename))
}

/// pass the input to the `less` command
pub(crate) fn print_with_less(input: &str) -> Result<()> {
    let mut child =
        std::process::Command::new("less").stdin(std::process::Stdio::piped()).spawn()?;

    let stdin = child.stdin.as_mut().ok_or_else(|| eyre!("unable to get stdin for less"))?;
    stdin.write_all(input.as_bytes())?;

    child.wait()?;
    Ok(())
}
