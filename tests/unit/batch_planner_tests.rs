/*!
 * Tests for batch planning
 */

use subtx::errors::TranslationError;
use subtx::translation::BatchPlanner;

use crate::common;

fn indices(segments: &[subtx::Segment]) -> Vec<usize> {
    segments.iter().map(|s| s.index).collect()
}

#[test]
fn test_batchPlanner_plan_shouldCoverAllSegmentsOnce() {
    let segments = common::numbered_segments(37);

    for batch_size in [1, 3, 10, 37, 50] {
        let planner = BatchPlanner::new(batch_size, 4).unwrap();
        let batches = planner.plan(&segments);

        let flattened: Vec<usize> = batches.iter().flat_map(|b| b.item_indices()).collect();
        assert_eq!(flattened, indices(&segments), "batch size {}", batch_size);
        assert_eq!(batches.len(), planner.batch_count(segments.len()));
        assert!(batches.iter().all(|b| b.len() <= batch_size));
    }
}

#[test]
fn test_batchPlanner_plan_shouldBoundContextAndEmptyItAtEdges() {
    let segments = common::numbered_segments(23);
    let batches = BatchPlanner::new(4, 2).unwrap().plan(&segments);

    assert!(batches.first().unwrap().pre_context.is_empty());
    assert!(batches.last().unwrap().post_context.is_empty());
    for batch in &batches {
        assert!(batch.pre_context.len() <= 2);
        assert!(batch.post_context.len() <= 2);

        let items = batch.item_indices();
        assert!(indices(&batch.pre_context).iter().all(|i| !items.contains(i)));
        assert!(indices(&batch.post_context).iter().all(|i| !items.contains(i)));
    }
}

#[test]
fn test_batchPlanner_plan_withTwentyThreeSegments_shouldMatchExpectedWindows() {
    let segments = common::numbered_segments(23);
    let batches = BatchPlanner::new(10, 5).unwrap().plan(&segments);

    let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
    assert_eq!(sizes, vec![10, 10, 3]);

    assert_eq!(indices(&batches[1].pre_context), vec![6, 7, 8, 9, 10]);
    assert_eq!(indices(&batches[1].post_context), vec![21, 22, 23]);
    assert_eq!(indices(&batches[2].pre_context), vec![16, 17, 18, 19, 20]);
}

#[test]
fn test_batchPlanner_plan_withZeroContext_shouldOmitContext() {
    let segments = common::numbered_segments(5);
    let batches = BatchPlanner::new(2, 0).unwrap().plan(&segments);

    assert!(batches.iter().all(|b| b.pre_context.is_empty() && b.post_context.is_empty()));
}

#[test]
fn test_batchPlanner_plan_shouldBeDeterministic() {
    let segments = common::numbered_segments(12);
    let planner = BatchPlanner::new(5, 3).unwrap();

    assert_eq!(planner.plan(&segments), planner.plan(&segments));
}

#[test]
fn test_batchPlanner_plan_withNoSegments_shouldReturnNoBatches() {
    assert!(BatchPlanner::new(10, 5).unwrap().plan(&[]).is_empty());
}

#[test]
fn test_batchPlanner_new_withZeroBatchSize_shouldFail() {
    assert!(matches!(BatchPlanner::new(0, 5), Err(TranslationError::InvalidBatchSize(0))));
}
