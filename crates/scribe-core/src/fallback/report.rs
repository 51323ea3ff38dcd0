//! Per-job quality report and annotated merge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::engine::QualityLevel;
use crate::executor::ChunkResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub failed: usize,
}

impl QualityCounts {
    fn add(&mut self, level: QualityLevel) {
        match level {
            QualityLevel::High => self.high += 1,
            QualityLevel::Medium => self.medium += 1,
            QualityLevel::Low => self.low += 1,
            QualityLevel::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityRating {
    Excellent,
    Good,
    Moderate,
    Degraded,
}

impl QualityRating {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            QualityRating::Excellent
        } else if score >= 70.0 {
            QualityRating::Good
        } else if score >= 50.0 {
            QualityRating::Moderate
        } else {
            QualityRating::Degraded
        }
    }
}

impl fmt::Display for QualityRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityRating::Excellent => "Excellent",
            QualityRating::Good => "Good",
            QualityRating::Moderate => "Moderate",
            QualityRating::Degraded => "Degraded",
        };
        f.write_str(s)
    }
}

/// Summary of which engines and quality levels served a job's chunks.
/// Built once after every chunk resolved; stored as JSON on the job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub total_chunks: usize,
    pub succeeded: usize,
    /// Successful chunks per engine.
    pub engine_usage: BTreeMap<String, usize>,
    pub quality_counts: QualityCounts,
    /// `(high*100 + medium*70 + low*40) / total_chunks`, in [0, 100].
    pub score: f64,
    pub rating: QualityRating,
    /// `(chunk index, reason)` for every chunk with a fallback reason.
    pub fallbacks: Vec<(usize, String)>,
    pub failed_chunks: Vec<usize>,
}

impl QualityReport {
    pub fn from_results(results: &[ChunkResult]) -> Self {
        let mut sorted: Vec<&ChunkResult> = results.iter().collect();
        sorted.sort_by_key(|r| r.index);

        let mut engine_usage = BTreeMap::new();
        let mut quality_counts = QualityCounts::default();
        let mut fallbacks = Vec::new();
        let mut failed_chunks = Vec::new();
        for r in &sorted {
            if r.success {
                let engine = r.engine_used.clone().unwrap_or_else(|| "unknown".to_string());
                *engine_usage.entry(engine).or_insert(0) += 1;
                quality_counts.add(r.quality_level);
            } else {
                quality_counts.add(QualityLevel::Failed);
                failed_chunks.push(r.index);
            }
            if let Some(reason) = &r.fallback_reason {
                fallbacks.push((r.index, reason.clone()));
            }
        }

        let total_chunks = sorted.len();
        let weighted = quality_counts.high * QualityLevel::High.weight() as usize
            + quality_counts.medium * QualityLevel::Medium.weight() as usize
            + quality_counts.low * QualityLevel::Low.weight() as usize;
        let score = if total_chunks == 0 {
            0.0
        } else {
            weighted as f64 / total_chunks as f64
        };

        Self {
            total_chunks,
            succeeded: total_chunks - failed_chunks.len(),
            engine_usage,
            quality_counts,
            score,
            rating: QualityRating::from_score(score),
            fallbacks,
            failed_chunks,
        }
    }

    /// Engine that served the most chunks; ties go to the name sorting first.
    pub fn primary_engine(&self) -> Option<&str> {
        self.engine_usage
            .iter()
            .fold(None::<(&String, usize)>, |best, (name, count)| match best {
                Some((_, c)) if c >= *count => best,
                _ => Some((name, *count)),
            })
            .map(|(name, _)| name.as_str())
    }

    /// Hint shown with a degraded report.
    pub fn tip(&self) -> Option<&'static str> {
        (self.rating == QualityRating::Degraded)
            .then_some("consider re-running with different engines or checking system resources")
    }
}

impl fmt::Display for QualityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "transcribed {}/{} chunks, quality {:.0}% ({})",
            self.succeeded, self.total_chunks, self.score, self.rating
        )?;
        for (engine, count) in &self.engine_usage {
            let pct = *count as f64 * 100.0 / self.total_chunks.max(1) as f64;
            writeln!(f, "  {}: {} chunks ({:.0}%)", engine, count, pct)?;
        }
        if !self.fallbacks.is_empty() {
            writeln!(f, "{} chunks used fallback:", self.fallbacks.len())?;
            for (index, reason) in self.fallbacks.iter().take(5) {
                writeln!(f, "  chunk {}: {}", index + 1, reason)?;
            }
            if self.fallbacks.len() > 5 {
                writeln!(f, "  ... and {} more", self.fallbacks.len() - 5)?;
            }
        }
        if let Some(tip) = self.tip() {
            writeln!(f, "tip: {}", tip)?;
        }
        Ok(())
    }
}

/// Merge successful chunks in index order, inserting a marker line wherever
/// the engine differs from the previous successful chunk's engine.
pub fn merge_annotated(results: &[ChunkResult]) -> String {
    let mut sorted: Vec<&ChunkResult> = results
        .iter()
        .filter(|r| r.success && !r.text.is_empty())
        .collect();
    sorted.sort_by_key(|r| r.index);

    let mut lines: Vec<String> = Vec::with_capacity(sorted.len());
    let mut prev_engine: Option<&str> = None;
    for r in sorted {
        let engine = r.engine_used.as_deref().unwrap_or("unknown");
        if prev_engine.is_some_and(|p| p != engine) {
            lines.push(format!("[chunk {}: {} ({})]", r.index + 1, engine, r.quality_level));
        }
        prev_engine = Some(engine);
        lines.push(r.text.clone());
    }
    lines.join("\n")
}
