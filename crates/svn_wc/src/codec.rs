// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Flat-text (de)serialization for entries, properties, and log records,
//! used by `FsWcStore` to persist the administrative area as real files
//! (spec §4.5's pre-1.7 "entries file" format, before Subversion folded
//! everything into a single `wc.db`).

use anyhow::Context;
use svn_types::{Checksum, Depth, Entry, NodeKind, PropertyMap, RepoPath, Revision, Schedule};

use crate::log::{EntryField, LogOp};

fn opt_field(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn some_or_dash(value: Option<&str>) -> Option<String> {
    match value {
        Some("-") | None => None,
        Some(s) => Some(s.to_string()),
    }
}

fn kind_to_str(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::File => "file",
        NodeKind::Directory => "dir",
        NodeKind::None => "none",
        NodeKind::Unknown => "unknown",
    }
}

fn kind_from_str(s: &str) -> NodeKind {
    match s {
        "file" => NodeKind::File,
        "dir" => NodeKind::Directory,
        "none" => NodeKind::None,
        _ => NodeKind::Unknown,
    }
}

fn schedule_to_str(schedule: Schedule) -> &'static str {
    match schedule {
        Schedule::Normal => "normal",
        Schedule::Add => "add",
        Schedule::Delete => "delete",
        Schedule::Replace => "replace",
    }
}

fn schedule_from_str(s: &str) -> Schedule {
    match s {
        "add" => Schedule::Add,
        "delete" => Schedule::Delete,
        "replace" => Schedule::Replace,
        _ => Schedule::Normal,
    }
}

fn depth_to_str(depth: Depth) -> &'static str {
    match depth {
        Depth::Empty => "empty",
        Depth::Files => "files",
        Depth::Immediates => "immediates",
        Depth::Infinity => "infinity",
        Depth::Exclude => "exclude",
        Depth::Unknown => "unknown",
    }
}

fn depth_from_str(s: &str) -> Depth {
    match s {
        "empty" => Depth::Empty,
        "files" => Depth::Files,
        "immediates" => Depth::Immediates,
        "infinity" => Depth::Infinity,
        "exclude" => Depth::Exclude,
        _ => Depth::Unknown,
    }
}

fn revision_to_str(rev: Revision) -> String {
    match rev {
        Revision::Number(n) => n.to_string(),
        Revision::Invalid => "invalid".to_string(),
        Revision::Head => "head".to_string(),
    }
}

fn revision_from_str(s: &str) -> Revision {
    match s {
        "invalid" => Revision::Invalid,
        "head" => Revision::Head,
        n => n.parse::<u64>().map(Revision::Number).unwrap_or(Revision::Invalid),
    }
}

fn checksum_to_str(checksum: &Checksum) -> String {
    match checksum {
        Checksum::Md5(_) => format!("md5:{}", checksum.to_hex()),
        Checksum::Sha1(_) => format!("sha1:{}", checksum.to_hex()),
    }
}

fn checksum_from_str(s: &str) -> anyhow::Result<Checksum> {
    let (alg, hex_digest) = s.split_once(':').context("malformed checksum field")?;
    let bytes = hex::decode(hex_digest).context("malformed checksum hex")?;
    match alg {
        "md5" => {
            let arr: [u8; 16] = bytes.try_into().map_err(|_| anyhow::anyhow!("bad md5 length"))?;
            Ok(Checksum::Md5(arr))
        }
        "sha1" => {
            let arr: [u8; 20] = bytes.try_into().map_err(|_| anyhow::anyhow!("bad sha1 length"))?;
            Ok(Checksum::Sha1(arr))
        }
        other => anyhow::bail!("unknown checksum algorithm '{other}'"),
    }
}

/// Serializes an `Entry` as `key=value` lines, one field per line, in a
/// fixed order so diffs of the entries file are stable.
pub fn serialize_entry(entry: &Entry) -> String {
    let mut out = String::new();
    out.push_str(&format!("name={}\n", entry.name));
    out.push_str(&format!("kind={}\n", kind_to_str(entry.kind)));
    out.push_str(&format!("url={}\n", entry.url));
    out.push_str(&format!("repos_root={}\n", entry.repos_root));
    out.push_str(&format!("repos_uuid={}\n", entry.repos_uuid));
    out.push_str(&format!("base_rev={}\n", revision_to_str(entry.base_rev)));
    out.push_str(&format!("last_committed_rev={}\n", revision_to_str(entry.last_committed_rev)));
    out.push_str(&format!(
        "last_committed_date={}\n",
        entry.last_committed_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!("last_committed_author={}\n", opt_field(&entry.last_committed_author)));
    out.push_str(&format!(
        "checksum={}\n",
        entry.checksum.as_ref().map(checksum_to_str).unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "text_time={}\n",
        entry.text_time.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!(
        "prop_time={}\n",
        entry.prop_time.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!("schedule={}\n", schedule_to_str(entry.schedule)));
    out.push_str(&format!("copied={}\n", entry.copied));
    out.push_str(&format!("copyfrom_url={}\n", opt_field(&entry.copyfrom_url)));
    out.push_str(&format!(
        "copyfrom_rev={}\n",
        entry.copyfrom_rev.map(revision_to_str).unwrap_or_else(|| "-".to_string())
    ));
    out.push_str(&format!("conflict_old={}\n", opt_field(&entry.conflict_old)));
    out.push_str(&format!("conflict_new={}\n", opt_field(&entry.conflict_new)));
    out.push_str(&format!("conflict_working={}\n", opt_field(&entry.conflict_working)));
    out.push_str(&format!("prop_conflict={}\n", opt_field(&entry.prop_conflict)));
    out.push_str(&format!("depth={}\n", depth_to_str(entry.depth)));
    out
}

/// Parses the format `serialize_entry` produces. Unknown/missing fields
/// fall back to sensible defaults rather than failing, matching the
/// original's tolerance of old-format entries files.
pub fn parse_entry(text: &str) -> anyhow::Result<Entry> {
    let mut fields = std::collections::HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            fields.insert(key.to_string(), value.to_string());
        }
    }
    let get = |k: &str| fields.get(k).map(|s| s.as_str());

    Ok(Entry {
        name: get("name").unwrap_or_default().to_string(),
        kind: get("kind").map(kind_from_str).unwrap_or(NodeKind::Unknown),
        url: get("url").unwrap_or_default().to_string(),
        repos_root: get("repos_root").unwrap_or_default().to_string(),
        repos_uuid: get("repos_uuid").unwrap_or_default().to_string(),
        base_rev: get("base_rev").map(revision_from_str).unwrap_or(Revision::Invalid),
        last_committed_rev: get("last_committed_rev").map(revision_from_str).unwrap_or(Revision::Invalid),
        last_committed_date: get("last_committed_date").and_then(|s| some_or_dash(Some(s))).and_then(|s| s.parse().ok()),
        last_committed_author: get("last_committed_author").and_then(|s| some_or_dash(Some(s))),
        checksum: match get("checksum").and_then(|s| some_or_dash(Some(s))) {
            Some(s) => Some(checksum_from_str(&s)?),
            None => None,
        },
        text_time: get("text_time").and_then(|s| some_or_dash(Some(s))).and_then(|s| s.parse().ok()),
        prop_time: get("prop_time").and_then(|s| some_or_dash(Some(s))).and_then(|s| s.parse().ok()),
        schedule: get("schedule").map(schedule_from_str).unwrap_or(Schedule::Normal),
        copied: get("copied").map(|s| s == "true").unwrap_or(false),
        copyfrom_url: get("copyfrom_url").and_then(|s| some_or_dash(Some(s))),
        copyfrom_rev: get("copyfrom_rev").and_then(|s| some_or_dash(Some(s))).map(|s| revision_from_str(&s)),
        conflict_old: get("conflict_old").and_then(|s| some_or_dash(Some(s))),
        conflict_new: get("conflict_new").and_then(|s| some_or_dash(Some(s))),
        conflict_working: get("conflict_working").and_then(|s| some_or_dash(Some(s))),
        prop_conflict: get("prop_conflict").and_then(|s| some_or_dash(Some(s))),
        depth: get("depth").map(depth_from_str).unwrap_or(Depth::Unknown),
    })
}

/// Serializes a property map as one `name\thex(value)` line per entry.
pub fn serialize_props(props: &PropertyMap) -> String {
    let mut out = String::new();
    for (name, value) in props.iter() {
        out.push_str(&format!("{name}\t{}\n", hex::encode(value)));
    }
    out
}

pub fn parse_props(text: &str) -> anyhow::Result<PropertyMap> {
    let mut props = PropertyMap::new();
    for line in text.lines() {
        if let Some((name, hex_value)) = line.split_once('\t') {
            let value = hex::decode(hex_value).context("malformed property value hex")?;
            props.set(name.to_string(), Some(value));
        }
    }
    Ok(props)
}

/// Escapes a `RepoPath` into a single filesystem-safe path component.
pub fn escape_path(path: &RepoPath) -> String {
    path.as_str().replace('%', "%25").replace('/', "%2F")
}

fn log_op_to_line(op: &LogOp) -> String {
    match op {
        LogOp::Move { from, to } => format!("mv\t{}\t{}", from.as_str(), to.as_str()),
        LogOp::Copy { from, to } => format!("cp\t{}\t{}", from.as_str(), to.as_str()),
        LogOp::Remove { path } => format!("rm\t{}", path.as_str()),
        LogOp::SetEntryField { path, field, value } => {
            let field_name = match field {
                EntryField::Schedule => "schedule",
                EntryField::TextTime => "text_time",
                EntryField::PropTime => "prop_time",
            };
            format!("set-entry-field\t{}\t{field_name}\t{}", path.as_str(), value.as_deref().unwrap_or("-"))
        }
        LogOp::SetProp { path, name, value } => format!(
            "set-prop\t{}\t{name}\t{}",
            path.as_str(),
            value.as_ref().map(hex::encode).unwrap_or_else(|| "-".to_string())
        ),
        LogOp::CommitLogMarker => "commit-log-marker".to_string(),
    }
}

fn log_op_from_line(line: &str) -> anyhow::Result<LogOp> {
    let parts: Vec<&str> = line.split('\t').collect();
    match parts.as_slice() {
        ["mv", from, to] => Ok(LogOp::Move { from: RepoPath::from(*from), to: RepoPath::from(*to) }),
        ["cp", from, to] => Ok(LogOp::Copy { from: RepoPath::from(*from), to: RepoPath::from(*to) }),
        ["rm", path] => Ok(LogOp::Remove { path: RepoPath::from(*path) }),
        ["set-entry-field", path, field_name, value] => {
            let field = match *field_name {
                "schedule" => EntryField::Schedule,
                "text_time" => EntryField::TextTime,
                "prop_time" => EntryField::PropTime,
                other => anyhow::bail!("unknown entry field '{other}'"),
            };
            Ok(LogOp::SetEntryField {
                path: RepoPath::from(*path),
                field,
                value: some_or_dash(Some(value)),
            })
        }
        ["set-prop", path, name, value] => Ok(LogOp::SetProp {
            path: RepoPath::from(*path),
            name: name.to_string(),
            value: match *value {
                "-" => None,
                hex_value => Some(hex::decode(hex_value).context("malformed log set-prop hex")?),
            },
        }),
        ["commit-log-marker"] => Ok(LogOp::CommitLogMarker),
        _ => anyhow::bail!("malformed log line: {line}"),
    }
}

pub fn serialize_log(ops: &[LogOp]) -> String {
    ops.iter().map(log_op_to_line).collect::<Vec<_>>().join("\n")
}

pub fn parse_log(text: &str) -> anyhow::Result<Vec<LogOp>> {
    text.lines().filter(|l| !l.is_empty()).map(log_op_from_line).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use svn_types::Revision;

    #[test]
    fn entry_round_trips_through_text() {
        let mut entry = Entry::new_this_dir("file:///repo/trunk", "file:///repo", "uuid-1", Revision::Number(4));
        entry.checksum = Some(Checksum::md5_of(b"hello"));
        entry.last_committed_author = Some("jrandom".to_string());
        entry.copyfrom_url = Some("file:///repo/branches/x".to_string());
        entry.copyfrom_rev = Some(Revision::Number(2));
        entry.schedule = Schedule::Add;
        entry.copied = true;

        let text = serialize_entry(&entry);
        let parsed = parse_entry(&text).unwrap();

        assert_eq!(parsed.name, entry.name);
        assert_eq!(parsed.base_rev, entry.base_rev);
        assert_eq!(parsed.checksum, entry.checksum);
        assert_eq!(parsed.schedule, entry.schedule);
        assert_eq!(parsed.copied, entry.copied);
        assert_eq!(parsed.copyfrom_url, entry.copyfrom_url);
        assert_eq!(parsed.copyfrom_rev, entry.copyfrom_rev);
    }

    #[test]
    fn properties_round_trip_through_hex_encoding() {
        let mut props = PropertyMap::new();
        props.set("svn:eol-style", Some(b"LF".to_vec()));
        props.set("svn:mergeinfo", Some(b"/trunk:1-5\n".to_vec()));

        let text = serialize_props(&props);
        let parsed = parse_props(&text).unwrap();
        assert_eq!(parsed.get_str("svn:eol-style"), Some("LF"));
        assert_eq!(parsed.get("svn:mergeinfo"), props.get("svn:mergeinfo"));
    }

    #[test]
    fn log_ops_round_trip_through_text() {
        let ops = vec![
            LogOp::Move { from: RepoPath::from("a"), to: RepoPath::from("b") },
            LogOp::SetProp { path: RepoPath::from("a"), name: "svn:executable".to_string(), value: Some(b"*".to_vec()) },
            LogOp::CommitLogMarker,
        ];
        let text = serialize_log(&ops);
        let parsed = parse_log(&text).unwrap();
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn escape_path_avoids_slash_collisions() {
        let a = escape_path(&RepoPath::from("trunk/a"));
        let b = escape_path(&RepoPath::from("trunk"));
        assert_ne!(a, format!("{b}a"));
    }
}
