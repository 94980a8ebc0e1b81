use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use bytes::{BufMut, BytesMut};
use ere_grep::{Regex, Submatch};

const RESET: &[u8] = b"\x1b[0m";

// red is the base color for whole matches, the rest go to capture groups
const SUBMATCH_COLORS: [&[u8]; 6] = [
    b"\x1b[31m",
    b"\x1b[32m",
    b"\x1b[33m",
    b"\x1b[34m",
    b"\x1b[35m",
    b"\x1b[36m",
];

struct Args {
    pattern: String,
    paths: Vec<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = args.into_iter().peekable();
    // accepted for compatibility with `grep -E`
    if args.peek().map(String::as_str) == Some("-E") {
        args.next();
    }
    let Some(pattern) = args.next() else {
        bail!("usage: ere-grep [-E] <pattern> [path...]");
    };
    let mut paths: Vec<PathBuf> = args.map(PathBuf::from).collect();
    if paths.is_empty() {
        paths.push(PathBuf::from("."));
    }
    Ok(Args { pattern, paths })
}

// Usage: ere-grep [-E] <pattern> [path...]
// Without paths the current directory is searched; `-` reads stdin.
fn main() {
    match run() {
        Ok(true) => process::exit(0),
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("ere-grep: {err:#}");
            process::exit(2)
        }
    }
}

fn run() -> Result<bool> {
    let args = parse_args(env::args().skip(1))?;
    let re = Regex::new(args.pattern.as_str()).context("failed to build regex")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut found = false;
    for path in &args.paths {
        if path.as_os_str() == "-" {
            found |= search_stdin(&re, &mut out)?;
            continue;
        }
        let info = fs::metadata(path).with_context(|| path.display().to_string())?;
        found |= if info.is_dir() {
            search_dir(path, &re, &mut out)?
        } else {
            search_file(path, &re, &mut out)?
        };
    }
    Ok(found)
}

fn search_stdin(re: &Regex, out: &mut impl Write) -> Result<bool> {
    let mut found = false;
    for line in io::stdin().lock().split(b'\n') {
        let line = line.context("failed to read stdin")?;
        if re.is_match(&line) {
            found = true;
            out.write_all(&line)?;
            out.write_all(b"\n")?;
        }
    }
    Ok(found)
}

/// Searches every file below `dir`. Symlinks are resolved; broken ones and
/// ones pointing at directories are skipped.
fn search_dir(dir: &Path, re: &Regex, out: &mut impl Write) -> Result<bool> {
    let mut entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    entries.sort();

    let mut found = false;
    for path in entries {
        let info = fs::symlink_metadata(&path).with_context(|| path.display().to_string())?;
        if info.is_dir() {
            found |= search_dir(&path, re, out)?;
            continue;
        }
        if info.file_type().is_symlink() {
            match fs::metadata(&path) {
                Ok(target) if target.is_file() => {}
                Ok(_) => continue,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(err) => return Err(err).with_context(|| path.display().to_string()),
            }
        }
        found |= search_file(&path, re, out)?;
    }
    Ok(found)
}

fn search_file(path: &Path, re: &Regex, out: &mut impl Write) -> Result<bool> {
    let content = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let content = content.strip_suffix(b"\n").unwrap_or(&content);

    let mut buf = BytesMut::new();
    for (i, line) in content.split(|&b| b == b'\n').enumerate() {
        let matches = re.find_all_submatches(line, None);
        if matches.is_empty() {
            continue;
        }
        if buf.is_empty() {
            buf.put_slice(path.display().to_string().as_bytes());
            buf.put_slice(b":\n");
        }
        buf.put_slice(format!("{}:", i + 1).as_bytes());
        render_line(&mut buf, line, &matches);
        buf.put_u8(b'\n');
    }

    if buf.is_empty() {
        return Ok(false);
    }
    buf.put_u8(b'\n');
    out.write_all(&buf)?;
    Ok(true)
}

fn render_line(buf: &mut BytesMut, line: &[u8], matches: &[Vec<Submatch<'_>>]) {
    let mut last_end = 0;
    for submatches in matches {
        let whole = submatches[0];
        buf.put_slice(&line[last_end..whole.start()]);
        render_match(buf, line, submatches);
        last_end = whole.end();
    }
    buf.put_slice(&line[last_end..]);
}

/// Colors a whole match in the base color and each group in its own color,
/// as long as there are few enough groups to go around.
fn render_match(buf: &mut BytesMut, line: &[u8], submatches: &[Submatch<'_>]) {
    let whole = submatches[0];
    let base = SUBMATCH_COLORS[0];
    let paint = |buf: &mut BytesMut, color: &[u8], text: &[u8]| {
        if !text.is_empty() {
            buf.put_slice(color);
            buf.put_slice(text);
            buf.put_slice(RESET);
        }
    };

    if submatches.len() == 1 || submatches.len() > SUBMATCH_COLORS.len() {
        paint(buf, base, whole.as_bytes());
        return;
    }

    let mut cursor = whole.start();
    for (group, color) in submatches[1..].iter().zip(&SUBMATCH_COLORS[1..]) {
        // nested or repeated groups may start before what was already printed
        if group.start() < cursor {
            continue;
        }
        paint(buf, base, &line[cursor..group.start()]);
        paint(buf, *color, group.as_bytes());
        cursor = group.end();
    }
    paint(buf, base, &line[cursor..whole.end()]);
}
