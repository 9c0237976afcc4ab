use crate::core::citations::align_citations;
use crate::core::drafting::LiteratureReviewer;
use crate::core::keywords::{KeywordExtractor, PhraseGenerator, SearchPlan};
use crate::core::ranking::Ranker;
use crate::core::render;
use crate::core::selection::PaperSelector;
use crate::domain::model::{
    FinalDocument, PaperRecord, ProgressEvent, ReviewType, SearchMethod, SearchQuery,
    SourceOrigin, Topic,
};
use crate::domain::ports::{LanguageModel, PaperSource, ProgressSink, SilentProgress, Storage};
use crate::utils::error::{ReviewError, Result};
use crate::utils::monitor::RunMonitor;

/// Per-run settings that shape the pipeline.
#[derive(Debug, Clone)]
pub struct ReviewOptions {
    pub review_type: ReviewType,
    pub search_method: SearchMethod,
    pub min_references: usize,
    pub local_limit: usize,
    pub scholar_limit: usize,
    /// Log a timing summary at the end of the run.
    pub monitor: bool,
    /// Sample process CPU and memory after each stage.
    pub system_stats: bool,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            review_type: ReviewType::Standard,
            search_method: SearchMethod::PubMed,
            min_references: 5,
            local_limit: crate::adapters::local::DEFAULT_LOCAL_LIMIT,
            scholar_limit: 40,
            monitor: false,
            system_stats: false,
        }
    }
}

impl ReviewOptions {
    fn max_results(&self, origin: SourceOrigin, plan: &SearchPlan) -> usize {
        match origin {
            SourceOrigin::PubMed => plan.topic_results + plan.phrases * plan.results_per_phrase,
            SourceOrigin::Local => self.local_limit,
            SourceOrigin::Scholar => self.scholar_limit,
        }
    }
}

pub struct ReviewEngine<S: Storage> {
    llm: Box<dyn LanguageModel>,
    sources: Vec<Box<dyn PaperSource>>,
    storage: S,
    options: ReviewOptions,
    progress: Box<dyn ProgressSink>,
}

impl<S: Storage> ReviewEngine<S> {
    pub fn new(
        llm: Box<dyn LanguageModel>,
        sources: Vec<Box<dyn PaperSource>>,
        storage: S,
        options: ReviewOptions,
    ) -> Self {
        Self {
            llm,
            sources,
            storage,
            options,
            progress: Box::new(SilentProgress),
        }
    }

    pub fn with_monitoring(mut self, monitor: bool, system_stats: bool) -> Self {
        self.options.monitor = monitor;
        self.options.system_stats = system_stats;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &ReviewOptions {
        &self.options
    }

    fn emit(&self, event: ProgressEvent) {
        tracing::debug!("📣 {}", event);
        self.progress.emit(&event);
    }

    async fn collect_papers(&self, query: &SearchQuery, plan: &SearchPlan) -> Result<Vec<Vec<PaperRecord>>> {
        let mut batches = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let origin = source.origin();
            let max_results = self.options.max_results(origin, plan);
            tracing::info!("🔍 Searching {} (up to {} papers)", origin, max_results);

            let papers = match source.search(query, max_results).await {
                Ok(papers) => papers,
                Err(e) if source.required() => return Err(e),
                Err(e) => {
                    tracing::warn!("⚠️ {} search failed, continuing without it: {}", origin, e);
                    Vec::new()
                }
            };
            self.emit(ProgressEvent::PapersFound {
                origin,
                count: papers.len(),
            });
            batches.push(papers);
        }
        Ok(batches)
    }

    /// Runs the full pipeline for `topic` and returns the aligned document.
    pub async fn run(&self, topic: &Topic) -> Result<FinalDocument> {
        let mut monitor = RunMonitor::new(self.options.system_stats);
        tracing::info!("🚀 Starting {} review: {}", self.options.review_type, topic);

        let keywords = KeywordExtractor::default()
            .extract(self.llm.as_ref(), topic)
            .await?;
        self.emit(ProgressEvent::KeywordsExtracted {
            keywords: keywords.as_slice().to_vec(),
        });

        let plan = SearchPlan::for_min_references(self.options.min_references);
        let mut query = SearchQuery::new(topic.clone(), keywords.clone());
        query.results_per_phrase = plan.results_per_phrase;
        query.topic_results = plan.topic_results;
        if self.options.search_method == SearchMethod::PubMed {
            query.phrases = PhraseGenerator
                .generate(self.llm.as_ref(), topic, plan.phrases)
                .await;
        }
        monitor.finish_stage("keywords");

        let batches = self.collect_papers(&query, &plan).await?;
        monitor.finish_stage("search");

        let ranked = Ranker::default().rank(batches, topic, &keywords);
        self.emit(ProgressEvent::PapersRanked {
            count: ranked.len(),
        });
        if ranked.is_empty() {
            return Err(ReviewError::InsufficientPapers {
                requested: self.options.min_references,
                found: 0,
            });
        }

        let selected = PaperSelector::new(self.options.min_references)
            .select(self.llm.as_ref(), topic, ranked)
            .await;
        self.emit(ProgressEvent::PapersSelected {
            selected: selected.len(),
            requested: selected.requested,
        });
        monitor.finish_stage("selection");

        let draft = LiteratureReviewer::new(self.options.review_type)
            .draft(self.llm.as_ref(), topic, &selected, self.progress.as_ref())
            .await?;
        self.emit(ProgressEvent::DraftGenerated {
            sections: draft.sections.len(),
        });
        monitor.finish_stage("drafting");

        let aligned = align_citations(draft, &selected);
        self.emit(ProgressEvent::CitationsAligned {
            entries: aligned.bibliography.len(),
        });
        monitor.finish_stage("alignment");

        if self.options.monitor {
            monitor.log_summary();
        }

        Ok(FinalDocument {
            topic: topic.clone(),
            keywords,
            review_type: self.options.review_type,
            draft: aligned.draft,
            bibliography: aligned.bibliography,
            shortfall: selected.shortfall,
            alignment: aligned.report,
        })
    }

    /// Runs the pipeline and writes the rendered review through storage.
    pub async fn run_and_publish(&self, topic: &Topic) -> Result<(FinalDocument, Vec<String>)> {
        let document = self.run(topic).await?;
        let written = render::publish(&self.storage, &document).await?;
        Ok((document, written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::ScriptedModel;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| ReviewError::IoError(std::io::ErrorKind::NotFound.into()))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct FixedSource {
        origin: SourceOrigin,
        papers: Option<Vec<PaperRecord>>,
        required: bool,
    }

    #[async_trait]
    impl PaperSource for FixedSource {
        async fn search(&self, _query: &SearchQuery, _max: usize) -> Result<Vec<PaperRecord>> {
            self.papers.clone().ok_or_else(|| ReviewError::SourceUnavailable {
                origin: self.origin,
                message: "offline".to_string(),
                transient: false,
            })
        }

        fn origin(&self) -> SourceOrigin {
            self.origin
        }

        fn required(&self) -> bool {
            self.required
        }
    }

    /// Remembers the query and limit it was searched with.
    #[derive(Default)]
    struct RecordingSource {
        seen: Mutex<Option<(SearchQuery, usize)>>,
    }

    #[async_trait]
    impl PaperSource for Arc<RecordingSource> {
        async fn search(&self, query: &SearchQuery, max: usize) -> Result<Vec<PaperRecord>> {
            *self.seen.lock().unwrap() = Some((query.clone(), max));
            Ok(papers(3))
        }

        fn origin(&self) -> SourceOrigin {
            SourceOrigin::PubMed
        }
    }

    fn papers(n: usize) -> Vec<PaperRecord> {
        (0..n)
            .map(|i| {
                let mut p = PaperRecord::new(format!("Gut study {}", i + 1), SourceOrigin::Local);
                p.authors = vec![format!("A. Author{}", i)];
                p.abstract_text = "Microbiome and depression.".to_string();
                p
            })
            .collect()
    }

    fn model() -> ScriptedModel {
        ScriptedModel::new()
            .reply("most important keywords", "gut\nmicrobiome\ndepression")
            .reply("Write the Introduction", "Intro [P1].")
            .reply("Write the body section", "## Evidence\nFindings [P2, P3] and [P8].")
            .reply("Write the Conclusion", "Summary [P1].")
    }

    fn options() -> ReviewOptions {
        ReviewOptions {
            review_type: ReviewType::Quick,
            search_method: SearchMethod::Local,
            min_references: 3,
            ..ReviewOptions::default()
        }
    }

    #[tokio::test]
    async fn runs_pipeline_and_publishes() {
        let storage = MockStorage::default();
        let source = FixedSource {
            origin: SourceOrigin::Local,
            papers: Some(papers(3)),
            required: true,
        };
        let engine = ReviewEngine::new(Box::new(model()), vec![Box::new(source)], storage.clone(), options());
        let topic = Topic::new("gut microbiome and depression").unwrap();

        let (document, written) = engine.run_and_publish(&topic).await.unwrap();
        assert_eq!(document.bibliography.len(), 3);
        // Both body sections cite the missing eighth paper.
        assert_eq!(document.alignment.dangling_markers, vec!["[P8]", "[P8]"]);
        assert!(document.shortfall.is_none());
        assert_eq!(written.len(), 2);

        let markdown = storage.read_file(render::MARKDOWN_FILE).await.unwrap();
        assert!(String::from_utf8(markdown).unwrap().contains("## References"));
    }

    fn pubmed_options() -> ReviewOptions {
        ReviewOptions {
            search_method: SearchMethod::PubMed,
            ..options()
        }
    }

    #[tokio::test]
    async fn pubmed_mode_searches_generated_phrases() {
        let source = Arc::new(RecordingSource::default());
        let llm = model().reply(
            "alternative search phrases",
            "1. probiotics and mood disorders\n2. gut brain axis signalling\n3. one too many",
        );
        let engine = ReviewEngine::new(
            Box::new(llm),
            vec![Box::new(source.clone())],
            MockStorage::default(),
            pubmed_options(),
        );
        let topic = Topic::new("gut microbiome and depression").unwrap();

        engine.run(&topic).await.unwrap();

        let (query, max) = source.seen.lock().unwrap().clone().unwrap();
        assert_eq!(
            query.phrases,
            vec!["probiotics and mood disorders", "gut brain axis signalling"]
        );
        assert_eq!(query.results_per_phrase, 10);
        assert_eq!(query.topic_results, 20);
        assert_eq!(max, 40);
    }

    #[tokio::test]
    async fn phrase_failure_falls_back_to_keyword_query() {
        let source = Arc::new(RecordingSource::default());
        let engine = ReviewEngine::new(
            Box::new(model()),
            vec![Box::new(source.clone())],
            MockStorage::default(),
            pubmed_options(),
        );
        let topic = Topic::new("gut microbiome and depression").unwrap();

        let document = engine.run(&topic).await.unwrap();

        let (query, _) = source.seen.lock().unwrap().clone().unwrap();
        assert!(query.phrases.is_empty());
        assert_eq!(query.keywords.as_slice(), &["gut", "microbiome", "depression"]);
        assert_eq!(document.bibliography.len(), 3);
    }

    #[tokio::test]
    async fn local_mode_skips_phrase_generation() {
        let source = Arc::new(RecordingSource::default());
        let llm = model().reply("alternative search phrases", "never used");
        let engine = ReviewEngine::new(
            Box::new(llm),
            vec![Box::new(source.clone())],
            MockStorage::default(),
            options(),
        );
        let topic = Topic::new("gut microbiome and depression").unwrap();

        engine.run(&topic).await.unwrap();

        let (query, _) = source.seen.lock().unwrap().clone().unwrap();
        assert!(query.phrases.is_empty());
    }

    #[tokio::test]
    async fn optional_source_failure_is_tolerated() {
        let local = FixedSource {
            origin: SourceOrigin::Local,
            papers: Some(papers(3)),
            required: true,
        };
        let scholar = FixedSource {
            origin: SourceOrigin::Scholar,
            papers: None,
            required: false,
        };
        let engine = ReviewEngine::new(
            Box::new(model()),
            vec![Box::new(local), Box::new(scholar)],
            MockStorage::default(),
            options(),
        );
        let topic = Topic::new("gut microbiome and depression").unwrap();
        assert!(engine.run(&topic).await.is_ok());
    }

    #[tokio::test]
    async fn required_source_failure_aborts() {
        let source = FixedSource {
            origin: SourceOrigin::PubMed,
            papers: None,
            required: true,
        };
        let engine = ReviewEngine::new(Box::new(model()), vec![Box::new(source)], MockStorage::default(), options());
        let topic = Topic::new("gut microbiome and depression").unwrap();

        let err = engine.run(&topic).await.unwrap_err();
        assert!(matches!(err, ReviewError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn no_papers_is_an_error() {
        let source = FixedSource {
            origin: SourceOrigin::Local,
            papers: Some(Vec::new()),
            required: true,
        };
        let engine = ReviewEngine::new(Box::new(model()), vec![Box::new(source)], MockStorage::default(), options());
        let topic = Topic::new("gut microbiome and depression").unwrap();

        let err = engine.run(&topic).await.unwrap_err();
        assert!(matches!(err, ReviewError::InsufficientPapers { found: 0, .. }));
    }
}
