use std::{
    env, fs,
    io::{Read, Write},
    path::Path,
};

use eyre::{eyre, Result};
use tracing::trace;

/// Replaces the current working directory prefix of `path` with `.`.
///
/// ```no_run
/// use arbor_common::utils::io::file::short_path;
///
/// let path = "/some/long/path/that/is/cwd/main.json";
/// let short_path = short_path(path);
/// assert_eq!(short_path, "./main.json");
/// ```
pub fn short_path(path: &str) -> String {
    match env::current_dir() {
        Ok(dir) => match dir.to_str() {
            Some(dir) if !dir.is_empty() => path.replacen(dir, ".", 1),
            _ => path.to_owned(),
        },
        Err(_) => path.to_owned(),
    }
}

/// Writes `contents` to the file at `path_str`, creating missing parent directories.
///
/// ```no_run
/// use arbor_common::utils::io::file::write_file;
///
/// let result = write_file("/tmp/main.wgsl", "fn main() {}");
/// ```
pub fn write_file(path_str: &str, contents: &str) -> Result<()> {
    let path = Path::new(path_str);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| eyre!("unable to create directory '{}': {e}", parent.display()))?;
    }

    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    trace!("wrote {} bytes to '{}'", contents.len(), short_path(path_str));

    Ok(())
}

/// Reads the whole file at `path` into a string.
///
/// ```no_run
/// use arbor_common::utils::io::file::read_file;
///
/// let contents = read_file("/tmp/module.json");
/// ```
pub fn read_file(path: &str) -> Result<String> {
    let mut file =
        fs::File::open(Path::new(path)).map_err(|e| eyre!("unable to open '{path}': {e}"))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Removes the file or directory tree at `path`. A missing path counts as removed.
///
/// ```no_run
/// use arbor_common::utils::io::file::delete_path;
///
/// let removed = delete_path("/tmp/arbor");
/// ```
pub fn delete_path(path: &str) -> bool {
    let path = Path::new(path);
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };

    result.is_ok()
}
