use httpmock::prelude::*;
use lit_review::adapters::{PubMedSource, ScholarSource};
use lit_review::domain::model::{KeywordSet, SearchQuery, SourceOrigin, Topic};
use lit_review::domain::ports::PaperSource;
use lit_review::ReviewError;
use std::time::Duration;

fn article(pmid: &str, title: &str, abstract_text: &str) -> String {
    format!(
        r#"<PubmedArticle>
  <MedlineCitation>
    <PMID Version="1">{pmid}</PMID>
    <Article>
      <Journal>
        <JournalIssue><PubDate><Year>2022</Year><Month>06</Month></PubDate></JournalIssue>
        <Title>Journal of Psychiatry</Title>
      </Journal>
      <ArticleTitle>{title}</ArticleTitle>
      <Abstract><AbstractText>{abstract_text}</AbstractText></Abstract>
      <AuthorList>
        <Author><LastName>Smith</LastName><ForeName>Jane</ForeName><Initials>J</Initials></Author>
      </AuthorList>
    </Article>
  </MedlineCitation>
</PubmedArticle>"#
    )
}

fn article_set(articles: &[String]) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<PubmedArticleSet>{}</PubmedArticleSet>",
        articles.join("\n")
    )
}

fn pubmed(server: &MockServer) -> PubMedSource {
    PubMedSource::new(reqwest::Client::new())
        .with_base_url(server.base_url())
        .with_request_delay(Duration::ZERO)
        .with_backoff(Duration::ZERO)
}

fn query() -> SearchQuery {
    SearchQuery::new(
        Topic::new("gut microbiome and depression").unwrap(),
        KeywordSet::new(["gut microbiome", "depression"]).unwrap(),
    )
}

#[tokio::test]
async fn test_pubmed_search_collects_and_fetches_unique_ids() {
    let server = MockServer::start_async().await;

    let topic_search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("db", "pubmed")
                .query_param("retmode", "json")
                .query_param("term", "gut microbiome and depression");
            then.status(200).json_body(serde_json::json!({
                "esearchresult": { "count": "2", "idlist": ["111", "222"] }
            }));
        })
        .await;

    let keyword_search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "gut microbiome depression");
            then.status(200).json_body(serde_json::json!({
                "esearchresult": { "count": "2", "idlist": ["222", "333"] }
            }));
        })
        .await;

    let fetch = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/efetch.fcgi")
                .query_param("retmode", "xml")
                .query_param("id", "111,222,333");
            then.status(200)
                .header("Content-Type", "text/xml")
                .body(article_set(&[
                    article("111", "Gut microbiome and depression", "Cohort study."),
                    article("222", "Probiotics for depression", "A randomized trial."),
                    article("333", "Microbial metabolites and mood", "Review &amp; synthesis."),
                ]));
        })
        .await;

    let papers = pubmed(&server).search(&query(), 50).await.unwrap();

    topic_search.assert_async().await;
    keyword_search.assert_async().await;
    fetch.assert_async().await;

    assert_eq!(papers.len(), 3);
    assert_eq!(papers[0].title, "Gut microbiome and depression");
    assert_eq!(papers[0].authors, vec!["J. Smith"]);
    assert_eq!(papers[0].year(), Some(2022));
    assert_eq!(papers[0].journal.as_deref(), Some("Journal of Psychiatry"));
    assert_eq!(
        papers[0].link().as_deref(),
        Some("https://pubmed.ncbi.nlm.nih.gov/111/")
    );
    assert_eq!(papers[2].abstract_text, "Review & synthesis.");
    assert!(papers.iter().all(|p| p.origin == SourceOrigin::PubMed));
}

#[tokio::test]
async fn test_pubmed_searches_each_generated_phrase() {
    let server = MockServer::start_async().await;

    let topic_search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "gut microbiome and depression")
                .query_param("retmax", "20");
            then.status(200)
                .json_body(serde_json::json!({ "esearchresult": { "idlist": ["1"] } }));
        })
        .await;
    let first_phrase = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "probiotics and mood disorders")
                .query_param("retmax", "12");
            then.status(200)
                .json_body(serde_json::json!({ "esearchresult": { "idlist": ["2", "1"] } }));
        })
        .await;
    let second_phrase = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "gut brain axis signalling")
                .query_param("retmax", "12");
            then.status(200)
                .json_body(serde_json::json!({ "esearchresult": { "idlist": ["3"] } }));
        })
        .await;
    let keyword_search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "gut microbiome depression");
            then.status(200)
                .json_body(serde_json::json!({ "esearchresult": { "idlist": ["9"] } }));
        })
        .await;
    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/efetch.fcgi").query_param("id", "1,2,3");
            then.status(200).body(article_set(&[
                article("1", "First", "One."),
                article("2", "Second", "Two."),
                article("3", "Third", "Three."),
            ]));
        })
        .await;

    let mut query = query();
    query.phrases = vec![
        "probiotics and mood disorders".to_string(),
        "gut brain axis signalling".to_string(),
    ];
    query.results_per_phrase = 12;
    query.topic_results = 20;

    let papers = pubmed(&server).search(&query, 44).await.unwrap();

    topic_search.assert_async().await;
    first_phrase.assert_async().await;
    second_phrase.assert_async().await;
    fetch.assert_async().await;
    assert_eq!(keyword_search.hits_async().await, 0);
    assert_eq!(papers.len(), 3);
}

#[tokio::test]
async fn test_pubmed_respects_max_results() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(200).json_body(serde_json::json!({
                "esearchresult": { "idlist": ["1", "2", "3"] }
            }));
        })
        .await;

    let fetch = server
        .mock_async(|when, then| {
            when.method(GET).path("/efetch.fcgi").query_param("id", "1,2");
            then.status(200).body(article_set(&[
                article("1", "First", "One."),
                article("2", "Second", "Two."),
            ]));
        })
        .await;

    let papers = pubmed(&server).search(&query(), 2).await.unwrap();
    fetch.assert_async().await;
    assert_eq!(papers.len(), 2);
}

#[tokio::test]
async fn test_pubmed_server_error_is_retried_once_then_unavailable() {
    let server = MockServer::start_async().await;

    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(503).body("Service Unavailable");
        })
        .await;

    let err = pubmed(&server).search(&query(), 10).await.unwrap_err();

    assert_eq!(failing.hits_async().await, 2);
    match err {
        ReviewError::SourceUnavailable {
            origin, transient, ..
        } => {
            assert_eq!(origin, SourceOrigin::PubMed);
            assert!(transient);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_pubmed_client_error_is_not_retried() {
    let server = MockServer::start_async().await;

    let failing = server
        .mock_async(|when, then| {
            when.method(GET).path("/esearch.fcgi");
            then.status(400).body("Bad Request");
        })
        .await;

    assert!(pubmed(&server).search(&query(), 10).await.is_err());
    assert_eq!(failing.hits_async().await, 1);
}

#[tokio::test]
async fn test_scholar_titles_resolve_through_pubmed() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/scholar").query_param("start", "0");
            then.status(200).body(
                r#"<html><body>
                <h3 class="gs_rt"><a href="/x">Gut microbiota in depression</a></h3>
                <h3 class="gs_rt"><a href="/y">Psychobiotics review</a></h3>
                </body></html>"#,
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/scholar").query_param("start", "10");
            then.status(200).body("<html><body></body></html>");
        })
        .await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "Gut microbiota in depression");
            then.status(200)
                .json_body(serde_json::json!({ "esearchresult": { "idlist": ["10"] } }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/esearch.fcgi")
                .query_param("term", "Psychobiotics review");
            then.status(200)
                .json_body(serde_json::json!({ "esearchresult": { "idlist": [] } }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/efetch.fcgi").query_param("id", "10");
            then.status(200).body(article_set(&[article(
                "10",
                "Gut microbiota in depression",
                "Altered microbiota.",
            )]));
        })
        .await;

    let scholar = ScholarSource::new(reqwest::Client::new(), pubmed(&server))
        .with_base_url(server.url("/scholar"))
        .with_pages(4);

    let papers = scholar.search(&query(), 40).await.unwrap();
    assert_eq!(papers.len(), 1);
    assert_eq!(papers[0].title, "Gut microbiota in depression");
    assert_eq!(papers[0].origin, SourceOrigin::Scholar);
    assert!(!scholar.required());
}
