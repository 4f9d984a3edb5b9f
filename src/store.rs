//! The handler metadata store.
//!
//! Ties the whole pipeline together: parse a directory, build its type
//! catalog, classify handlers, analyze their bodies, and cache the result
//! per directory. The cache is the only shared mutable state in the crate.

use anyhow::Result;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::catalog::{extract_doc_text, TypeCatalog};
use crate::detector::BodyAnalyzer;
use crate::doc_comment::parse_handler_info;
use crate::expr::{lower_type, normalize_receiver};
use crate::framework::FrameworkCaps;
use crate::metadata::{HandlerMetadata, HandlerRecord, PackageAnalysis};
use crate::parser::{AstParser, ParsedFile};

type CacheEntry = Option<Arc<PackageAnalysis>>;

/// Per-directory handler metadata with a double-checked read/write-locked
/// cache. A directory is analyzed at most once; analysis failures are
/// cached as unavailable so repeated lookups do not re-parse.
pub struct HandlerMetadataStore {
    caps: FrameworkCaps,
    cache: RwLock<HashMap<PathBuf, CacheEntry>>,
    analysis_runs: AtomicUsize,
}

impl HandlerMetadataStore {
    pub fn new(caps: FrameworkCaps) -> Self {
        Self {
            caps,
            cache: RwLock::new(HashMap::new()),
            analysis_runs: AtomicUsize::new(0),
        }
    }

    /// Metadata for a handler by name, case-insensitively. Returns the
    /// empty metadata when the directory is unavailable or the name is
    /// unknown. Name collisions fall back to the first discovered handler;
    /// use [`lookup_at`](Self::lookup_at) to disambiguate.
    pub fn lookup(&self, func_name: &str, dir: &Path) -> HandlerMetadata {
        self.package_analysis(dir)
            .and_then(|analysis| {
                analysis
                    .records(func_name)
                    .and_then(|records| records.first())
                    .map(|record| record.metadata.clone())
            })
            .unwrap_or_default()
    }

    /// Metadata for a handler narrowed by defining file, receiver type,
    /// and call-site line. Each criterion only narrows when it leaves at
    /// least one candidate; remaining ties resolve to the first discovered
    /// handler.
    pub fn lookup_at(
        &self,
        func_name: &str,
        dir: &Path,
        file: &Path,
        receiver: &str,
        min_line: usize,
    ) -> HandlerMetadata {
        let analysis = match self.package_analysis(dir) {
            Some(analysis) => analysis,
            None => return HandlerMetadata::default(),
        };
        let records = match analysis.records(func_name) {
            Some(records) if !records.is_empty() => records,
            _ => return HandlerMetadata::default(),
        };

        let mut candidates: Vec<&HandlerRecord> = records.iter().collect();

        narrow(&mut candidates, |record| record.file_path == file);
        let wanted_receiver = normalize_receiver(receiver);
        narrow(&mut candidates, |record| {
            record.receiver == wanted_receiver
        });
        narrow(&mut candidates, |record| record.start_line <= min_line);

        candidates
            .first()
            .map(|record| record.metadata.clone())
            .unwrap_or_default()
    }

    /// How many directory analyses actually ran, regardless of cache hits.
    pub fn analysis_runs(&self) -> usize {
        self.analysis_runs.load(Ordering::SeqCst)
    }

    /// The cached analysis for a directory, running it on first access.
    pub fn package_analysis(&self, dir: &Path) -> CacheEntry {
        let key = dir.to_path_buf();

        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = cache.get(&key) {
                return entry.clone();
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have analyzed while we waited for the lock.
        if let Some(entry) = cache.get(&key) {
            return entry.clone();
        }

        self.analysis_runs.fetch_add(1, Ordering::SeqCst);
        let entry = match self.analyze_directory(dir) {
            Ok(analysis) => {
                info!(
                    "Analyzed {}: {} handlers",
                    dir.display(),
                    analysis.handler_count()
                );
                Some(Arc::new(analysis))
            }
            Err(e) => {
                warn!("Directory unavailable {}: {:#}", dir.display(), e);
                None
            }
        };
        cache.insert(key, entry.clone());
        entry
    }

    fn analyze_directory(&self, dir: &Path) -> Result<PackageAnalysis> {
        let files = AstParser::parse_dir(dir)?;
        let catalog = TypeCatalog::build(&files);
        let analyzer = BodyAnalyzer::new(&self.caps, &catalog);

        let mut analysis = PackageAnalysis::default();
        for file in &files {
            self.collect_handlers(file, &file.syntax_tree.items, "", &analyzer, &mut analysis);
        }
        Ok(analysis)
    }

    fn collect_handlers(
        &self,
        file: &ParsedFile,
        items: &[syn::Item],
        receiver: &str,
        analyzer: &BodyAnalyzer,
        analysis: &mut PackageAnalysis,
    ) {
        for item in items {
            match item {
                syn::Item::Fn(item_fn) => {
                    if let Some(record) =
                        self.build_record(file, &item_fn.attrs, &item_fn.sig, &item_fn.block, receiver, analyzer)
                    {
                        analysis.insert(record);
                    }
                }
                syn::Item::Impl(item_impl) => {
                    let impl_receiver = lower_type(&item_impl.self_ty)
                        .terminal_name()
                        .map(str::to_string)
                        .unwrap_or_default();
                    for impl_item in &item_impl.items {
                        if let syn::ImplItem::Fn(method) = impl_item {
                            if let Some(record) = self.build_record(
                                file,
                                &method.attrs,
                                &method.sig,
                                &method.block,
                                &impl_receiver,
                                analyzer,
                            ) {
                                analysis.insert(record);
                            }
                        }
                    }
                }
                syn::Item::Mod(item_mod) => {
                    if let Some((_, inner)) = &item_mod.content {
                        self.collect_handlers(file, inner, receiver, analyzer, analysis);
                    }
                }
                _ => {}
            }
        }
    }

    fn build_record(
        &self,
        file: &ParsedFile,
        attrs: &[syn::Attribute],
        sig: &syn::Signature,
        block: &syn::Block,
        receiver: &str,
        analyzer: &BodyAnalyzer,
    ) -> Option<HandlerRecord> {
        if !self.caps.shape.matches(sig) {
            return None;
        }
        let func_name = sig.ident.to_string();
        debug!("Handler found: {} in {}", func_name, file.path.display());

        let info = extract_doc_text(attrs)
            .map(|doc| parse_handler_info(&doc))
            .unwrap_or_default();
        let body = analyzer.analyze(sig, block);

        Some(HandlerRecord {
            file_path: file.path.clone(),
            func_name,
            receiver: receiver.to_string(),
            start_line: sig.ident.span().start().line,
            metadata: HandlerMetadata {
                info,
                request_body: body.request_body,
                responses: body.responses,
            },
        })
    }
}

/// Applies a narrowing criterion only when it leaves candidates standing.
fn narrow<F>(candidates: &mut Vec<&HandlerRecord>, keep: F)
where
    F: Fn(&HandlerRecord) -> bool,
{
    let narrowed: Vec<&HandlerRecord> = candidates
        .iter()
        .copied()
        .filter(|record| keep(record))
        .collect();
    if !narrowed.is_empty() {
        *candidates = narrowed;
    }
}
