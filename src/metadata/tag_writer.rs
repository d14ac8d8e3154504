//! Container-specific tag writers backed by `lofty`.

use std::fs;
use std::path::{Path, PathBuf};

use lofty::config::WriteOptions;
use lofty::file::{TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::{Accessor, TagExt};
use lofty::probe::Probe;
use lofty::tag::{Tag, TagType};
use log::debug;
use thiserror::Error;

use crate::song::AudioFormat;

const COVER_DESCRIPTION: &str = "cover";

/// Any failure while parsing or persisting tags.
#[derive(Debug, Error)]
#[error("tag write failed for {path}: {reason}")]
pub struct TagWriteError {
    pub path: PathBuf,
    pub reason: String,
}

impl TagWriteError {
    fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Text fields written into every cached file.
#[derive(Debug, Clone, Copy)]
pub struct TrackTags<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    pub album: &'a str,
}

/// Embeds text tags and an optional cover into one container format.
pub trait TagEmbedder: Sync {
    fn embed(
        &self,
        path: &Path,
        tags: TrackTags<'_>,
        cover: Option<&Path>,
    ) -> Result<(), TagWriteError>;
}

/// FLAC: Vorbis comments and a picture block, persisted in one pass.
pub struct FlacEmbedder;

/// MP3: the APIC frame is persisted first, text frames in a second pass.
pub struct Mp3Embedder;

/// Embedder for `format`, or `None` when the container is not tagged.
pub fn embedder_for(format: AudioFormat) -> Option<&'static dyn TagEmbedder> {
    match format {
        AudioFormat::Flac => Some(&FlacEmbedder),
        AudioFormat::Mp3 => Some(&Mp3Embedder),
        AudioFormat::M4a => None,
    }
}

/// Writes `tags` (and `cover`, if any) into the file at `path`.
///
/// Formats without an embedder are left untouched.
pub fn write_tags(
    path: &Path,
    format: AudioFormat,
    tags: TrackTags<'_>,
    cover: Option<&Path>,
) -> Result<(), TagWriteError> {
    match embedder_for(format) {
        Some(embedder) => embedder.embed(path, tags, cover),
        None => {
            debug!(
                "TagWriter: no embedder for {format}; leaving {} untagged",
                path.display()
            );
            Ok(())
        }
    }
}

/// MIME type inferred from the thumbnail extension.
fn cover_mime_type(cover: &Path) -> Option<MimeType> {
    let extension = cover.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some(MimeType::Png),
        "jpg" | "jpeg" => Some(MimeType::Jpeg),
        _ => None,
    }
}

fn build_cover_picture(audio_path: &Path, cover: &Path) -> Result<Picture, TagWriteError> {
    let data = fs::read(cover).map_err(|err| {
        TagWriteError::new(
            audio_path,
            format!("failed to read cover {}: {err}", cover.display()),
        )
    })?;
    let mut builder = Picture::unchecked(data)
        .pic_type(PictureType::CoverFront)
        .description(COVER_DESCRIPTION);
    if let Some(mime_type) = cover_mime_type(cover) {
        builder = builder.mime_type(mime_type);
    }
    Ok(builder.build())
}

fn read_tagged_file(path: &Path) -> Result<TaggedFile, TagWriteError> {
    Probe::open(path)
        .map_err(|err| TagWriteError::new(path, format!("failed to open: {err}")))?
        .read()
        .map_err(|err| TagWriteError::new(path, format!("failed to parse: {err}")))
}

/// Returns the `tag_type` tag of `tagged_file`, inserting an empty one when missing.
fn tag_for_edit<'a>(
    tagged_file: &'a mut TaggedFile,
    tag_type: TagType,
    path: &Path,
) -> Result<&'a mut Tag, TagWriteError> {
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| TagWriteError::new(path, format!("file does not support {tag_type:?} tags")))
}

fn apply_text_fields(tag: &mut Tag, tags: TrackTags<'_>) {
    tag.set_title(tags.title.to_string());
    tag.set_artist(tags.artist.to_string());
    tag.set_album(tags.album.to_string());
}

fn save_tag(tag: &Tag, path: &Path) -> Result<(), TagWriteError> {
    tag.save_to_path(path, WriteOptions::default())
        .map_err(|err| TagWriteError::new(path, format!("failed to persist tags: {err}")))
}

impl TagEmbedder for FlacEmbedder {
    fn embed(
        &self,
        path: &Path,
        tags: TrackTags<'_>,
        cover: Option<&Path>,
    ) -> Result<(), TagWriteError> {
        let picture = cover
            .map(|cover| build_cover_picture(path, cover))
            .transpose()?;
        let mut tagged_file = read_tagged_file(path)?;
        let tag = tag_for_edit(&mut tagged_file, TagType::VorbisComments, path)?;
        apply_text_fields(tag, tags);
        if let Some(picture) = picture {
            tag.push_picture(picture);
        }
        save_tag(tag, path)
    }
}

impl TagEmbedder for Mp3Embedder {
    fn embed(
        &self,
        path: &Path,
        tags: TrackTags<'_>,
        cover: Option<&Path>,
    ) -> Result<(), TagWriteError> {
        if let Some(cover) = cover {
            let picture = build_cover_picture(path, cover)?;
            let mut tagged_file = read_tagged_file(path)?;
            let tag = tag_for_edit(&mut tagged_file, TagType::Id3v2, path)?;
            tag.push_picture(picture);
            save_tag(tag, path)?;
        }

        let mut tagged_file = read_tagged_file(path)?;
        let tag = tag_for_edit(&mut tagged_file, TagType::Id3v2, path)?;
        apply_text_fields(tag, tags);
        save_tag(tag, path)
    }
}
