//! The output collaborator interface (spec §4.6, §6).
//!
//! The emission core is opaque to how changesets are actually rendered —
//! it only calls [`ChangesetWriter::write_changeset`] once per emitted
//! changeset, in emission order. [`TextWriter`] is the reference
//! implementation of the plain-text record format from spec §6; a caller
//! wanting a different sink (e.g. a fast-export stream) implements the
//! trait directly instead.

use std::collections::HashMap;
use std::io::Write;

use chrono::{Local, TimeZone, Utc};

use crate::config::EmitConfig;
use crate::database::{ChangesetId, ChangesetVariant, Database, VersionId, TRUNK_TAG};
use crate::errors::EmitError;

/// Renders an emitted changeset. Implementors own their sink; the core
/// never inspects or buffers what's written.
pub trait ChangesetWriter {
    fn write_changeset(&mut self, db: &Database, id: ChangesetId, config: &EmitConfig) -> Result<(), EmitError>;
}

/// Formats a Unix timestamp as `YYYY-MM-DD HH:MM:SS TZ`, preferring the
/// local offset and falling back to UTC (spec §7 "Malformed date").
pub fn format_timestamp(epoch_secs: i64) -> Result<String, EmitError> {
    if let chrono::LocalResult::Single(dt) = Local.timestamp_opt(epoch_secs, 0) {
        return Ok(dt.format("%Y-%m-%d %H:%M:%S %Z").to_string());
    }
    if let chrono::LocalResult::Single(dt) = Utc.timestamp_opt(epoch_secs, 0) {
        return Ok(dt.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    Err(EmitError::MalformedDate(epoch_secs.to_string()))
}

/// Writes the exact text format of spec §6 to any [`Write`] sink.
pub struct TextWriter<W: Write> {
    out: W,
    commit_ids: HashMap<ChangesetId, u64>,
    next_id: u64,
}

impl<W: Write> TextWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            commit_ids: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Synthetic id assigned the first time a commit changeset is written;
    /// reused verbatim by that commit's implicit-merge record, if any.
    fn commit_id_for(&mut self, id: ChangesetId) -> u64 {
        *self.commit_ids.entry(id).or_insert_with(|| {
            let n = self.next_id;
            self.next_id += 1;
            n
        })
    }
}

fn branch_name_for(db: &Database, versions: &[VersionId], config: &EmitConfig) -> String {
    match versions.first().and_then(|&v| db.version(v).branch) {
        Some(tag) if tag == TRUNK_TAG => config.trunk_name.clone(),
        Some(tag) => db.tag(tag).name.clone(),
        None => "(anonymous)".to_string(),
    }
}

impl<W: Write> ChangesetWriter for TextWriter<W> {
    fn write_changeset(&mut self, db: &Database, id: ChangesetId, config: &EmitConfig) -> Result<(), EmitError> {
        match &db.changeset(id).variant {
            ChangesetVariant::Commit { versions, author, log } => {
                let versions = versions.clone();
                let author = author.clone();
                let log = log.clone();
                let time = db.changeset(id).time;

                let commit_id = self.commit_id_for(id);
                let branch = branch_name_for(db, &versions, config);
                let date = format_timestamp(time)?;
                writeln!(self.out, "{date} {branch} {author} {commit_id}")?;
                writeln!(self.out, "{log}")?;
                for v in &versions {
                    let node = db.version(*v);
                    writeln!(self.out, "\t{} {}", db.file(node.file).path, node.version)?;
                }
                writeln!(self.out)?;
            }
            ChangesetVariant::ImplicitMerge => {
                let parent = db
                    .changeset(id)
                    .parent
                    .expect("implicit_merge changeset must have a parent");
                let (parent_versions, author, log, time) = match &db.changeset(parent).variant {
                    ChangesetVariant::Commit { versions, author, log } => {
                        (versions.clone(), author.clone(), log.clone(), db.changeset(parent).time)
                    }
                    other => unreachable!("implicit_merge parent must be a commit changeset, got {other:?}"),
                };

                let commit_id = self.commit_id_for(parent);
                let branch = branch_name_for(db, &parent_versions, config);
                let date = format_timestamp(time)?;
                writeln!(self.out, "{date} {branch} {author} {commit_id}")?;
                writeln!(self.out, "{log}")?;
                for v in &parent_versions {
                    if db.version(*v).implicit_merge {
                        let node = db.version(*v);
                        writeln!(self.out, "\t{} {}", db.file(node.file).path, node.version)?;
                    }
                }
                writeln!(self.out)?;
            }
            ChangesetVariant::Tag(tag_id) => {
                let tag = db.tag(*tag_id);
                let kind = if tag.branch_versions.is_some() { "BRANCH" } else { "TAG" };
                let name = tag.name.clone();
                let time = db.changeset(id).time;
                let date = format_timestamp(time)?;
                writeln!(self.out, "{date} {kind} {name}")?;
                writeln!(self.out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;

    #[test]
    fn commit_record_has_header_log_and_file_lines() {
        let mut db = Database::new();
        let f = db.add_file("src/main.rs");
        let cs = db.add_commit_changeset(0, "alice", "initial import");
        db.add_version(f, "1.1", None, Some(TRUNK_TAG), false, false, cs);

        let mut writer = TextWriter::new(Vec::new());
        let config = EmitConfig::default();
        writer.write_changeset(&db, cs, &config).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("alice"));
        assert!(header.ends_with(" 1"));
        assert_eq!(lines.next().unwrap(), "initial import");
        assert_eq!(lines.next().unwrap(), "\tsrc/main.rs 1.1");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn implicit_merge_reuses_parent_header_and_filters_versions() {
        let mut db = Database::new();
        let fa = db.add_file("a.txt");
        let fb = db.add_file("b.txt");
        let vendor = db.add_branch_tag("VENDOR", 1);
        let cs = db.add_commit_changeset(1, "bob", "vendor drop");
        db.add_version(fa, "1.1.1.1", None, Some(vendor), false, true, cs);
        db.add_version(fb, "1.1.1.1", None, Some(vendor), false, false, cs);
        let merge = db.add_implicit_merge_changeset(cs);

        let mut writer = TextWriter::new(Vec::new());
        let config = EmitConfig::default();
        writer.write_changeset(&db, cs, &config).unwrap();
        writer.write_changeset(&db, merge, &config).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        let records: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(records[0].lines().next(), records[1].lines().next());
        assert!(records[1].contains("a.txt"));
        assert!(!records[1].contains("b.txt"));
    }

    #[test]
    fn tag_record_uses_branch_or_tag_keyword() {
        let mut db = Database::new();
        let tag = db.add_plain_tag("release-1-0", 9);
        let branch = db.add_branch_tag("stable", 9);

        let mut writer = TextWriter::new(Vec::new());
        let config = EmitConfig::default();
        writer.write_changeset(&db, db.tag(tag).changeset, &config).unwrap();
        writer.write_changeset(&db, db.tag(branch).changeset, &config).unwrap();
        let text = String::from_utf8(writer.into_inner()).unwrap();

        assert!(text.contains("TAG release-1-0"));
        assert!(text.contains("BRANCH stable"));
    }
}
