use recall_core::config::{Config, EmbeddingBackend};
use recall_core::{Chunker, Error, IngestItem, MetaValue, Metadata};

fn meta() -> Metadata {
    IngestItem::new("").with_meta("doc_id", "policy-7").with_meta("year", 2024i64).metadata
}

#[test]
fn empty_text_yields_no_chunks() {
    let chunker = Chunker::new(100, 0).expect("chunker");
    assert!(chunker.chunk("", &meta()).is_empty());
    assert!(chunker.chunk("   \n\t ", &meta()).is_empty());
}

#[test]
fn short_text_is_one_chunk_with_metadata_copied() {
    let chunker = Chunker::new(100, 0).expect("chunker");
    let chunks = chunker.chunk("  Refunds require a receipt\nwithin 30 days.  ", &meta());

    assert_eq!(chunks.len(), 1, "one short sentence becomes one chunk");
    assert_eq!(chunks[0].text, "Refunds require a receipt within 30 days.");
    assert_eq!(chunks[0].char_count, chunks[0].text.chars().count());
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!(chunks[0].metadata.get("doc_id"), Some(&MetaValue::from("policy-7")));
    assert_eq!(chunks[0].metadata.get("year"), Some(&MetaValue::Number(2024.0)));
}

#[test]
fn sentences_are_packed_greedily() {
    let chunker = Chunker::new(30, 0).expect("chunker");
    let chunks = chunker.chunk("Alpha beta. Gamma delta. Epsilon zeta.", &Metadata::new());
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

    assert_eq!(texts, vec!["Alpha beta. Gamma delta.", "Epsilon zeta."]);
    assert_eq!(chunks[1].chunk_index, 1);
}

#[test]
fn overlap_carries_whole_trailing_sentences() {
    let chunker = Chunker::new(30, 10).expect("chunker");
    let chunks = chunker.chunk("Alpha beta. Gamma delta. Epsilon zeta.", &Metadata::new());
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

    assert_eq!(texts, vec!["Alpha beta. Gamma delta.", "Gamma delta. Epsilon zeta."]);
    for c in &chunks { assert!(c.char_count <= 30); }
}

#[test]
fn oversized_sentence_falls_back_to_word_split_without_overlap() {
    let chunker = Chunker::new(20, 5).expect("chunker");
    let text = "Short one. This sentence is definitely much longer than twenty characters. End.";
    let chunks = chunker.chunk(text, &Metadata::new());
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

    assert_eq!(
        texts,
        vec!["Short one.", "This sentence is", "definitely much", "longer than twenty", "characters.", "End."]
    );
    for (i, c) in chunks.iter().enumerate() {
        assert!(c.char_count <= 20, "chunk {i} exceeds budget: {}", c.text);
        assert_eq!(c.chunk_index, i);
    }
}

#[test]
fn chunking_is_deterministic() {
    let chunker = Chunker::new(60, 20).expect("chunker");
    let text = "The archive opened in 1911. Records were kept by hand! Were they accurate? \
                Most ledgers survive. Some were lost to a flood in 1936.";
    let a = chunker.chunk(text, &meta());
    let b = chunker.chunk(text, &meta());
    assert_eq!(a, b);
    assert!(a.len() > 1);
}

#[test]
fn invalid_chunk_config_is_rejected() {
    assert!(matches!(Chunker::new(0, 0), Err(Error::InvalidConfig(_))));
    assert!(matches!(Chunker::new(100, 100), Err(Error::InvalidConfig(_))));
}

#[test]
fn config_layers_toml_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
            [index]
            dir = "idx"

            [chunking]
            chunk_size = 400
            chunk_overlap = 50

            [embedding]
            backend = "hash"
            dim = 64

            [reranker]
            endpoint = "http://localhost:8000/v1"
            model = "qwen3-reranker"
            "#,
        )?;
        jail.create_file("config.test.toml", "[retrieval]\nfinal_top_k = 7\n")?;
        jail.set_env("APP_RETRIEVAL__DENSE_TOP_K", "11");

        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;

        assert_eq!(settings.chunking.chunk_size, 400);
        assert_eq!(settings.chunking.chunk_overlap, 50);
        assert_eq!(settings.embedding.backend, EmbeddingBackend::Hash);
        assert_eq!(settings.embedding.dim, 64);
        assert_eq!(settings.retrieval.final_top_k, 7);
        assert_eq!(settings.retrieval.dense_top_k, 11);
        assert_eq!(settings.retrieval.sparse_top_k, 20, "untouched keys keep defaults");
        assert!(settings.rewriter.is_none());
        let reranker = settings.reranker.as_ref().expect("reranker section");
        assert_eq!(reranker.batch_size, 8);
        assert_eq!(settings.index_dir(std::path::Path::new("/srv")), std::path::PathBuf::from("/srv/idx"));
        Ok(())
    });
}

#[test]
fn settings_validation_rejects_overlap_larger_than_size() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("RUST_ENV", "test");
        jail.create_file("config.toml", "[chunking]\nchunk_size = 100\nchunk_overlap = 150\n")?;
        let config = Config::load().map_err(|e| e.to_string())?;
        assert!(config.settings().is_err());
        Ok(())
    });
}
