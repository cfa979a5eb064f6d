use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Create a run directory and return it
pub fn create_run_dir(base: &Path) -> anyhow::Result<PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    let dir = base.join("runs").join(run_id);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create {:?}", dir))?;
    Ok(dir)
}

pub fn write_artifact(dir: &Path, name: &str, content: &str) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, content).with_context(|| format!("failed to write {:?}", path))?;
    Ok(path)
}

/// Write rows as comma-joined lines. Fields are neither quoted nor escaped.
pub fn write_rows<R, F>(path: &Path, rows: R) -> anyhow::Result<usize>
where
    R: IntoIterator<Item = Vec<F>>,
    F: AsRef<str>,
{
    let file = fs::File::create(path).with_context(|| format!("failed to create {:?}", path))?;
    let mut out = std::io::BufWriter::new(file);
    let mut count = 0;
    for row in rows {
        let fields: Vec<&str> = row.iter().map(|f| f.as_ref()).collect();
        writeln!(out, "{}", fields.join(","))?;
        count += 1;
    }
    out.flush().with_context(|| format!("failed to write {:?}", path))?;
    Ok(count)
}

/// Escape an argument for `sh -c` / PowerShell: quotes and spaces only
pub fn shell_escape(arg: &str) -> String {
    let mut s = String::with_capacity(arg.len());
    for c in arg.chars() {
        match c {
            '\'' => s.push_str("'\"'\"'"),
            ' ' => s.push_str("\\ "),
            _ => s.push(c),
        }
    }
    s
}

/// `command arg1 arg2 ...` with each argument escaped
pub fn command_line(command: &str, args: &[String]) -> String {
    let mut line = command.to_string();
    for a in args {
        line.push(' ');
        line.push_str(&shell_escape(a));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_spaces() {
        assert_eq!(shell_escape("plain"), "plain");
        assert_eq!(shell_escape("a b"), "a\\ b");
        assert_eq!(shell_escape("it's"), "it'\"'\"'s");
    }

    #[test]
    fn command_line_appends_escaped_args() {
        let args = vec!["run".to_string(), "/tmp/my dir/setup.yml".to_string(), "0".to_string()];
        assert_eq!(command_line("./script.rb", &args), "./script.rb run /tmp/my\\ dir/setup.yml 0");
    }

    #[test]
    fn rows_are_joined_without_quoting() {
        let dir = create_run_dir(&std::env::temp_dir().join("scriptpipe-tests")).unwrap();
        let path = dir.join("rows.csv");
        let n = write_rows(&path, vec![vec!["a", "1", ""], vec!["b,c", "2", "x"]]).unwrap();
        assert_eq!(n, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,1,\nb,c,2,x\n");
        fs::remove_dir_all(dir).ok();
    }
}
