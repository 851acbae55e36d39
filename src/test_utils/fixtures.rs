//! Resource marker files, source trees, and tarballs for tests.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::path::{Path, PathBuf};
use tar::{EntryType, Header};

/// A marker file (`SKILL.md`, `AGENT.md`, `COMMAND.md`) with frontmatter.
#[derive(Debug, Clone)]
pub struct MarkdownFixture {
    pub path: String,
    pub content: String,
}

impl MarkdownFixture {
    fn marker(file: &str, name: &str, description: &str, extra: &str) -> Self {
        Self {
            path: format!("{name}/{file}"),
            content: format!(
                "---\nname: {name}\ndescription: {description}\n{extra}---\n\n# {name}\n\n{description}.\n"
            ),
        }
    }

    #[must_use]
    pub fn skill(name: &str, description: &str) -> Self {
        Self::marker("SKILL.md", name, description, "")
    }

    #[must_use]
    pub fn agent(name: &str, description: &str) -> Self {
        Self::marker("AGENT.md", name, description, "model: sonnet\n")
    }

    #[must_use]
    pub fn command(name: &str, description: &str) -> Self {
        Self::marker("COMMAND.md", name, description, "")
    }

    /// Marker with the given literal content.
    #[must_use]
    pub fn raw(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Same marker with a `version:` key added to the frontmatter.
    #[must_use]
    pub fn versioned(mut self, version: &str) -> Self {
        self.content = self.content.replacen("---\n", &format!("---\nversion: {version}\n"), 1);
        self
    }

    /// Place the marker in directory `dir` (relative to the tree root).
    #[must_use]
    pub fn at(mut self, dir: &str) -> Self {
        let file = Path::new(&self.path).file_name().map(|f| f.to_string_lossy().into_owned());
        self.path = match file {
            Some(file) => format!("{}/{file}", dir.trim_end_matches('/')),
            None => dir.to_string(),
        };
        self
    }
}

/// A tree of files that can be written to disk or packed into a tarball.
#[derive(Debug, Clone, Default)]
pub struct SourceTreeFixture {
    files: Vec<MarkdownFixture>,
}

impl SourceTreeFixture {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One skill, one agent and one command, each under its kind directory.
    #[must_use]
    pub fn mixed() -> Self {
        Self::new()
            .with_file(MarkdownFixture::skill("pdf", "Read and fill PDF forms").at("skills/pdf"))
            .with_file(MarkdownFixture::raw("skills/pdf/reference.md", "# Reference\n"))
            .with_file(MarkdownFixture::agent("reviewer", "Reviews pull requests").at("agents/reviewer"))
            .with_file(MarkdownFixture::command("deploy", "Ships the build").at("commands/ops/deploy"))
    }

    #[must_use]
    pub fn with_file(mut self, file: MarkdownFixture) -> Self {
        self.files.push(file);
        self
    }

    /// Write every file below `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        for file in &self.files {
            let path = dir.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &file.content).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(dir.to_path_buf())
    }

    /// Gzip-compressed tarball with every file under `top_level/`, the way
    /// forge archive endpoints wrap repository contents.
    pub fn to_tar_gz(&self, top_level: &str) -> Result<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for file in &self.files {
            let mut header = Header::new_gnu();
            header.set_size(file.content.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(EntryType::Regular);
            builder.append_data(&mut header, format!("{top_level}/{}", file.path), file.content.as_bytes())?;
        }
        Ok(builder.into_inner()?.finish()?)
    }
}

/// Tarball with verbatim entry names, including ones `tar::Builder` refuses
/// to write such as `../escape.txt` or `/etc/absolute`.
pub fn raw_tarball(entries: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = Header::new_old();
        let bytes = name.as_bytes();
        let slot = &mut header.as_old_mut().name;
        anyhow::ensure!(bytes.len() < slot.len(), "entry name too long: {name}");
        slot[..bytes.len()].copy_from_slice(bytes);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        header.set_cksum();
        builder.append(&header, *data)?;
    }
    Ok(builder.into_inner()?.finish()?)
}
