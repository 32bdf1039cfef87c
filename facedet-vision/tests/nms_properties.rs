use facedet_vision::{nms, BoundingBox, Detection, NmsPreset};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn det(x: f32, y: f32, w: f32, h: f32, confidence: f32) -> Detection {
    Detection {
        confidence,
        bbox: BoundingBox {
            x,
            y,
            width: w,
            height: h,
        },
        keypoints: vec![],
    }
}

fn random_detections(rng: &mut StdRng, n: usize) -> Vec<Detection> {
    (0..n)
        .map(|_| {
            // coarse confidences so ties actually happen
            let confidence = rng.gen_range(1..=20) as f32 / 20.0;
            det(
                rng.gen_range(0.0..400.0),
                rng.gen_range(0.0..400.0),
                rng.gen_range(10.0..120.0),
                rng.gen_range(10.0..120.0),
                confidence,
            )
        })
        .collect()
}

#[test]
fn test_overlapping_pair_keeps_higher_score() {
    // (10, 10, 100, 100) vs (0, 0, 100, 100): IoU = 8100 / 11900
    let detections = vec![
        det(0.0, 0.0, 100.0, 100.0, 0.9),
        det(10.0, 10.0, 100.0, 100.0, 0.8),
    ];
    let iou = detections[0].bbox.iou(&detections[1].bbox);
    assert!((iou - 0.68).abs() < 0.01);

    let result = nms(detections, 0.3);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].confidence, 0.9);
}

#[test]
fn test_input_order_does_not_matter_without_ties() {
    let detections = vec![
        det(10.0, 10.0, 100.0, 100.0, 0.8),
        det(0.0, 0.0, 100.0, 100.0, 0.9),
        det(300.0, 300.0, 50.0, 50.0, 0.5),
    ];
    let mut reversed = detections.clone();
    reversed.reverse();
    assert_eq!(nms(detections, 0.4), nms(reversed, 0.4));
}

#[test]
fn test_result_invariants() {
    let mut rng = StdRng::seed_from_u64(1234);
    for threshold in [0.3, 0.4, 0.5, 0.7] {
        for _ in 0..50 {
            let n = rng.gen_range(0..60);
            let result = nms(random_detections(&mut rng, n), threshold);

            // sorted non-increasing by confidence
            assert!(result
                .windows(2)
                .all(|w| w[0].confidence >= w[1].confidence));

            // no surviving pair overlaps more than the threshold
            for i in 0..result.len() {
                for j in (i + 1)..result.len() {
                    let iou = result[i].bbox.iou(&result[j].bbox);
                    assert!(iou <= threshold, "pair ({}, {}) has IoU {}", i, j, iou);
                }
            }
        }
    }
}

#[test]
fn test_idempotent() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..50 {
        let n = rng.gen_range(0..80);
        let threshold = NmsPreset::Standard.threshold();
        let once = nms(random_detections(&mut rng, n), threshold);
        let twice = nms(once.clone(), threshold);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_top_detection_survives_either_preset() {
    let mut rng = StdRng::seed_from_u64(5);
    for _ in 0..50 {
        let dets = random_detections(&mut rng, 40);
        let standard = nms(dets.clone(), NmsPreset::Standard.threshold());
        let aggressive = nms(dets, NmsPreset::Aggressive.threshold());
        assert_eq!(standard[0], aggressive[0]);
    }
}
