// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::ops::Range;

/// Number of COCO keypoints.
pub const NUM_KEYPOINTS: usize = 17;

/// Number of skeleton edges drawn per person.
pub const NUM_LINKS: usize = 16;

/// COCO keypoint names, index `i` is keypoint `i` of every keypoint set.
pub const COCO_KEYPOINT_INDEXES: [&str; NUM_KEYPOINTS] = [
    "nose",
    "left_eye",
    "right_eye",
    "left_ear",
    "right_ear",
    "left_shoulder",
    "right_shoulder",
    "left_elbow",
    "right_elbow",
    "left_wrist",
    "right_wrist",
    "left_hip",
    "right_hip",
    "left_knee",
    "right_knee",
    "left_ankle",
    "right_ankle",
];

/// Skeleton edges in drawing order (pairs of keypoint indices).
pub const LINK_INDEX_PAIRS: [[usize; 2]; NUM_LINKS] = [
    [15, 13], // left ankle to left knee
    [13, 11], // left knee to left hip
    [11, 5],  // left hip to left shoulder
    [12, 14], // right hip to right knee
    [14, 16], // right knee to right ankle
    [12, 6],  // right hip to right shoulder
    [3, 1],   // left ear to left eye
    [1, 2],   // left eye to right eye
    [1, 0],   // left eye to nose
    [0, 2],   // nose to right eye
    [2, 4],   // right eye to right ear
    [9, 7],   // left wrist to left elbow
    [7, 5],   // left elbow to left shoulder
    [5, 6],   // left shoulder to right shoulder
    [6, 8],   // right shoulder to right elbow
    [8, 10],  // right elbow to right wrist
];

/// Link indices drawn one pixel wide regardless of subject size (the face).
pub const THIN_LINK_RANGE: Range<usize> = 6..11;

/// Keypoints below this index are face points and get the smallest ring.
pub const FACE_KEYPOINT_COUNT: usize = 5;
