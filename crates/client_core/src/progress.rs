//! Normalizes raw `translation-status` payloads into progress snapshots.

use shared::{
    domain::{ChunkState, ChunkStatus},
    protocol::TranslationStatusPayload,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub percent: u8,
    pub chunks: Vec<ChunkStatus>,
    pub chunks_completed: u32,
    pub total_chunks: u32,
    pub partial_text: Option<String>,
}

pub fn normalize(raw: &TranslationStatusPayload) -> ProgressSnapshot {
    let percent = raw
        .progress_percent
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
        .round()
        .clamp(0.0, 100.0) as u8;

    let chunks: Vec<ChunkStatus> = raw
        .chunks_info
        .as_deref()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(index, info)| ChunkStatus {
            index,
            label: info
                .header
                .as_deref()
                .map(str::trim)
                .filter(|header| !header.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Chunk {}", index + 1)),
            size_chars: info.size.unwrap_or(0),
            state: ChunkState::from_wire(info.status.as_deref()),
        })
        .collect();

    let done = chunks
        .iter()
        .filter(|chunk| chunk.state == ChunkState::Done)
        .count() as u32;

    ProgressSnapshot {
        percent,
        chunks_completed: raw.chunks_completed.unwrap_or(done),
        total_chunks: raw.total_chunks.unwrap_or(chunks.len() as u32),
        chunks,
        partial_text: raw.partial_results.clone(),
    }
}

impl ProgressSnapshot {
    /// Copy whose percent is at least `floor`, so a late or reordered payload never
    /// shows progress going backwards.
    pub fn clamped_to(&self, floor: u8) -> Self {
        let mut snapshot = self.clone();
        snapshot.percent = snapshot.percent.max(floor);
        snapshot
    }

    pub fn chunk_summary(&self) -> String {
        format!("{}/{} chunks", self.chunks_completed, self.total_chunks)
    }
}
