use agent_registry::importer::{ItemStatus, RawRecord, WorkType};
use futures::stream;

use crate::support::{memory_service, song};

#[tokio::test]
async fn three_item_batch_with_shared_key() {
    let service = memory_service();
    // Origin ids differ only in surrounding whitespace, so the keys match.
    let items = vec![
        song("track-1", "Night Train"),
        song(" track-1 ", "Night Train (again)"),
        song("track-2", "Morning Bus"),
    ];

    let first = service.import(items.clone()).await;
    assert_eq!(
        (first.total, first.created, first.skipped, first.rejected, first.failed),
        (3, 2, 1, 0, 0)
    );

    let second = service.import(items).await;
    assert_eq!(
        (second.total, second.created, second.skipped, second.rejected, second.failed),
        (3, 0, 3, 0, 0)
    );
    for item in &second.items {
        assert!(matches!(
            item.status,
            ItemStatus::Duplicate {
                existing_id: Some(_)
            }
        ));
    }
}

#[tokio::test]
async fn counts_always_sum_to_total() {
    let service = memory_service();
    let items = vec![
        song("1", "Ok"),
        RawRecord::new("archive", ""),
        RawRecord::new("archive", "no-title").with_mime_type("audio/mpeg"),
        song("1", "Ok again"),
    ];

    let outcome = service.import(items).await;
    assert_eq!(outcome.total, 4);
    assert_eq!(
        outcome.created + outcome.skipped + outcome.rejected + outcome.failed,
        outcome.total
    );
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.rejected, 1);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.is_consistent());
}

#[tokio::test]
async fn reports_keep_submission_order_and_classification() {
    let service = memory_service();
    let items: Vec<RawRecord> = (0..20).map(|i| song(&i.to_string(), "Loop")).collect();

    let outcome = service.import(items).await;
    assert_eq!(outcome.created, 20);
    let indices: Vec<usize> = outcome.items.iter().map(|i| i.index).collect();
    assert_eq!(indices, (0..20).collect::<Vec<_>>());
    assert!(outcome
        .items
        .iter()
        .all(|i| i.classification.map(|c| c.work_type) == Some(WorkType::Music)));
}

#[tokio::test]
async fn stream_import_matches_batch_import() {
    let service = memory_service();
    let items = vec![song("a", "One"), song("b", "Two"), song("a", "One")];

    let outcome = service.import_stream(stream::iter(items), None).await;
    assert_eq!((outcome.created, outcome.skipped), (2, 1));
}
