use pretty_assertions::assert_eq;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use test_log::test;

use super::{
    CategorySelectSpy, MatchSpy, MultipleSpy, SpyRegistry, TermCountSpy, ValueCountSpy,
};
use crate::document::{Document, MemoryDocument};
use crate::{SpyError, Weight};

/// Spy counting the matches in process, without distributed support.
#[derive(Debug, Default)]
struct LocalCountSpy {
    count: usize,
    weight: Weight,
}

impl MatchSpy for LocalCountSpy {
    fn observe(&mut self, _doc: &dyn Document, weight: Weight) {
        self.count += 1;
        self.weight += weight;
    }
}

fn make_doc(color: &str, tags: &[&str]) -> MemoryDocument {
    let mut doc = MemoryDocument::new();
    doc.add_value(0, color.as_bytes().to_vec());
    doc.add_multi_value(1, tags.iter().copied());
    for tag in tags {
        doc.add_term(format!("T{}", tag), 1).unwrap();
    }
    doc
}

fn sample_docs() -> Vec<MemoryDocument> {
    vec![
        make_doc("red", &["new", "sale"]),
        make_doc("blue", &["new"]),
        make_doc("red", &[]),
        make_doc("green", &["sale"]),
        make_doc("red", &["new", "used"]),
        make_doc("", &["used"]),
    ]
}

fn template() -> MultipleSpy {
    let mut multiple_spy = MultipleSpy::new();
    let mut values = ValueCountSpy::new();
    values.add_slot(0, false);
    values.add_slot(1, true);
    multiple_spy.add_spy(values);
    multiple_spy.add_spy(TermCountSpy::for_prefix("T"));
    let mut nested = MultipleSpy::new();
    nested.add_spy(CategorySelectSpy::for_slot(0));
    multiple_spy.add_spy(nested);
    multiple_spy
}

#[test]
fn test_local_spy_only_observes() {
    let mut spy = LocalCountSpy::default();
    spy.observe(&MemoryDocument::new(), 0.5);
    spy.observe(&MemoryDocument::new(), 1.5);
    assert_eq!(spy.count, 2);
    assert_eq!(spy.weight, 2.0);
    assert_eq!(spy.description(), "MatchSpy()");

    let registry = SpyRegistry::default();
    assert!(matches!(
        spy.box_clone(),
        Err(SpyError::Unsupported { operation: "box_clone" })
    ));
    assert!(matches!(
        spy.name(),
        Err(SpyError::Unsupported { operation: "name" })
    ));
    assert!(matches!(
        spy.serialize_config(),
        Err(SpyError::Unsupported { .. })
    ));
    assert!(matches!(
        spy.reconstruct(&[], &registry),
        Err(SpyError::Unsupported { .. })
    ));
    assert!(matches!(
        spy.serialize_results(),
        Err(SpyError::Unsupported { .. })
    ));
    let err = spy.merge_results(&[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "MatchSpy not suitable for use with remote searches - merge_results() method unimplemented"
    );
}

#[test]
fn test_local_spy_in_multiple_spy() -> crate::Result<()> {
    let mut multiple_spy = MultipleSpy::new();
    let local = multiple_spy.add_spy(LocalCountSpy::default());
    let values = multiple_spy.add_spy(ValueCountSpy::for_slot(0));
    for doc in sample_docs() {
        multiple_spy.observe(&doc, 1.0);
    }
    assert_eq!(local.get(&multiple_spy).unwrap().count, 6);
    assert_eq!(values.get(&multiple_spy).unwrap().total(), 6);
    assert!(matches!(
        multiple_spy.serialize_config(),
        Err(SpyError::Unsupported { operation: "name" })
    ));
    assert!(multiple_spy.box_clone().is_err());
    Ok(())
}

#[test]
fn test_reconstruct_nested_multiple_spy() -> crate::Result<()> {
    let template = template();
    let config = template.serialize_config()?;
    let registry = SpyRegistry::default();
    let reconstructed = template.reconstruct(&config, &registry)?;
    assert_eq!(reconstructed.description(), template.description());
    assert_eq!(reconstructed.serialize_config()?, config);

    let reconstructed = reconstructed.downcast_ref::<MultipleSpy>().unwrap();
    let values = reconstructed
        .spy(0)
        .unwrap()
        .downcast_ref::<ValueCountSpy>()
        .unwrap();
    assert!(values.is_multi_valued(1));
    let nested = reconstructed
        .spy(2)
        .unwrap()
        .downcast_ref::<MultipleSpy>()
        .unwrap();
    assert!(nested
        .spy(0)
        .unwrap()
        .downcast_ref::<CategorySelectSpy>()
        .is_some());
    Ok(())
}

#[test]
fn test_reconstruct_unknown_spy_type() -> crate::Result<()> {
    let config = template().serialize_config()?;
    let mut registry = SpyRegistry::new();
    registry.register(Box::new(MultipleSpy::new()))?;
    registry.register(Box::new(ValueCountSpy::new()))?;
    let err = MultipleSpy::new()
        .reconstruct(&config, &registry)
        .unwrap_err();
    assert!(matches!(&err, SpyError::UnknownSpyType(name) if name == "TermCountSpy"));
    assert_eq!(
        err.to_string(),
        "Match spy type (TermCountSpy) was not known by the registry"
    );
    Ok(())
}

#[test]
fn test_reconstruct_truncated_config() -> crate::Result<()> {
    let config = template().serialize_config()?;
    let registry = SpyRegistry::default();
    for len in 1..config.len() {
        // cutting between two members leaves a valid, shorter config
        match MultipleSpy::new().reconstruct(&config[..len], &registry) {
            Ok(spy) => assert!(spy.downcast_ref::<MultipleSpy>().unwrap().len() < 3),
            Err(err) => assert!(matches!(err, SpyError::DataCorruption(_))),
        }
    }
    Ok(())
}

#[test]
fn test_sharded_search_matches_single_pass() -> crate::Result<()> {
    let template = template();
    let registry = SpyRegistry::default();
    let config = template.serialize_config()?;

    let mut docs = sample_docs();
    docs.extend(sample_docs());
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    docs.shuffle(&mut rng);

    let mut single_pass = template.box_clone()?;
    for doc in &docs {
        single_pass.observe(doc, 1.0);
    }

    let mut payloads = Vec::new();
    for shard_docs in docs.chunks(5) {
        let mut shard_spy = template.reconstruct(&config, &registry)?;
        for doc in shard_docs {
            shard_spy.observe(doc, 1.0);
        }
        payloads.push(shard_spy.serialize_results()?);
    }
    payloads.shuffle(&mut rng);

    let mut merged = template.box_clone()?;
    for payload in &payloads {
        merged.merge_results(payload)?;
    }
    assert_eq!(merged.serialize_results()?, single_pass.serialize_results()?);

    let merged = merged.downcast_ref::<MultipleSpy>().unwrap();
    let values = merged.spy(0).unwrap().downcast_ref::<ValueCountSpy>().unwrap();
    assert_eq!(values.total(), 12);
    let top = values.top_values(0, 2);
    let colors: Vec<(&[u8], u64)> = top
        .iter()
        .map(|item| (item.value(), item.frequency()))
        .collect();
    assert_eq!(colors, vec![(&b"red"[..], 6), (&b"blue"[..], 2)]);

    let terms = merged.spy(1).unwrap().downcast_ref::<TermCountSpy>().unwrap();
    assert_eq!(terms.documents_seen(), 12);
    assert_eq!(terms.terms_seen(), 14);
    Ok(())
}
