use crate::transform::{quaternion_w, quaternion_xyz};
use crate::types::Matrix34;
use serde::Serialize;

/// Column-oriented series of pose samples.
///
/// Every column always has the same length. Orientation is derived on
/// append: yaw, pitch and roll use single-argument arctangents, which
/// differs from [`convert_to_euler`](crate::transform::convert_to_euler)
/// outside the first quadrant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleBuffer {
    time: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
    z: Vec<f64>,
    yaw: Vec<f64>,
    pitch: Vec<f64>,
    roll: Vec<f64>,
    r_w: Vec<f64>,
    r_x: Vec<f64>,
    r_y: Vec<f64>,
    r_z: Vec<f64>,
}

/// One sample of a [`SampleBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleRow {
    pub time: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub r_w: f64,
    pub r_x: f64,
    pub r_y: f64,
    pub r_z: f64,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            time: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            yaw: Vec::with_capacity(capacity),
            pitch: Vec::with_capacity(capacity),
            roll: Vec::with_capacity(capacity),
            r_w: Vec::with_capacity(capacity),
            r_x: Vec::with_capacity(capacity),
            r_y: Vec::with_capacity(capacity),
            r_z: Vec::with_capacity(capacity),
        }
    }

    /// Append a pose matrix captured `t` seconds into the run.
    pub fn append(&mut self, m: &Matrix34, t: f64) {
        self.time.push(t);
        self.x.push(m[0][3]);
        self.y.push(m[1][3]);
        self.z.push(m[2][3]);

        let yaw = (m[1][0] / m[0][0]).atan();
        let pitch = (-m[2][0] / (m[2][1] * m[2][1] + m[2][2] * m[2][2]).sqrt()).atan();
        let roll = (m[2][1] / m[2][2]).atan();
        self.yaw.push(yaw.to_degrees());
        self.pitch.push(pitch.to_degrees());
        self.roll.push(roll.to_degrees());

        let w = quaternion_w(m);
        let [qx, qy, qz] = quaternion_xyz(m, w);
        self.r_w.push(w);
        self.r_x.push(qx);
        self.r_y.push(qy);
        self.r_z.push(qz);
    }

    pub fn clear(&mut self) {
        for column in [
            &mut self.time,
            &mut self.x,
            &mut self.y,
            &mut self.z,
            &mut self.yaw,
            &mut self.pitch,
            &mut self.roll,
            &mut self.r_w,
            &mut self.r_x,
            &mut self.r_y,
            &mut self.r_z,
        ] {
            column.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Seconds since the start of the sampling run.
    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn z(&self) -> &[f64] {
        &self.z
    }

    /// Degrees.
    pub fn yaw(&self) -> &[f64] {
        &self.yaw
    }

    /// Degrees.
    pub fn pitch(&self) -> &[f64] {
        &self.pitch
    }

    /// Degrees.
    pub fn roll(&self) -> &[f64] {
        &self.roll
    }

    pub fn r_w(&self) -> &[f64] {
        &self.r_w
    }

    pub fn r_x(&self) -> &[f64] {
        &self.r_x
    }

    pub fn r_y(&self) -> &[f64] {
        &self.r_y
    }

    pub fn r_z(&self) -> &[f64] {
        &self.r_z
    }

    /// Columns keyed by name, in storage order.
    pub fn columns(&self) -> [(&'static str, &[f64]); 11] {
        [
            ("time", self.time.as_slice()),
            ("x", self.x.as_slice()),
            ("y", self.y.as_slice()),
            ("z", self.z.as_slice()),
            ("yaw", self.yaw.as_slice()),
            ("pitch", self.pitch.as_slice()),
            ("roll", self.roll.as_slice()),
            ("r_w", self.r_w.as_slice()),
            ("r_x", self.r_x.as_slice()),
            ("r_y", self.r_y.as_slice()),
            ("r_z", self.r_z.as_slice()),
        ]
    }

    pub fn row(&self, i: usize) -> Option<SampleRow> {
        if i >= self.len() {
            return None;
        }
        Some(SampleRow {
            time: self.time[i],
            x: self.x[i],
            y: self.y[i],
            z: self.z[i],
            yaw: self.yaw[i],
            pitch: self.pitch[i],
            roll: self.roll[i],
            r_w: self.r_w[i],
            r_x: self.r_x[i],
            r_y: self.r_y[i],
            r_z: self.r_z[i],
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = SampleRow> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Serialize all columns as a JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::convert_to_euler;
    use crate::transform::tests::rotation;
    use crate::types::IDENTITY_MATRIX;

    #[test]
    fn test_append_and_clear() {
        let mut buffer = SampleBuffer::new();
        assert!(buffer.is_empty());
        for i in 0..5 {
            buffer.append(&IDENTITY_MATRIX, i as f64 * 0.01);
        }
        assert_eq!(buffer.len(), 5);
        for (name, column) in buffer.columns() {
            assert_eq!(column.len(), 5, "column {}", name);
        }

        buffer.clear();
        assert_eq!(buffer.len(), 0);
        for (_, column) in buffer.columns() {
            assert!(column.is_empty());
        }
    }

    #[test]
    fn test_append_identity_row() {
        let mut buffer = SampleBuffer::new();
        buffer.append(&IDENTITY_MATRIX, 0.5);
        let row = buffer.row(0).unwrap();
        assert_eq!(row.time, 0.5);
        assert_eq!([row.x, row.y, row.z], [0.0; 3]);
        assert_eq!([row.yaw, row.pitch, row.roll], [0.0; 3]);
        assert_eq!([row.r_w, row.r_x, row.r_y, row.r_z], [1.0, 0.0, 0.0, 0.0]);
        assert!(buffer.row(1).is_none());
    }

    #[test]
    fn test_append_matches_euler_in_first_quadrant() {
        let m = rotation(0.6, 0.3, 0.2, [0.1, 0.2, 0.3]);
        let mut buffer = SampleBuffer::new();
        buffer.append(&m, 0.0);
        let e = convert_to_euler(&m);
        assert!((buffer.yaw()[0] - e.yaw).abs() < 1e-9);
        assert!((buffer.pitch()[0] - e.pitch).abs() < 1e-9);
        assert!((buffer.roll()[0] - e.roll).abs() < 1e-9);
    }

    #[test]
    fn test_append_diverges_from_euler_past_90_degrees() {
        // yaw of 150° folds to -30° under a single-argument arctangent.
        let m = rotation(150f64.to_radians(), 0.0, 0.0, [0.0; 3]);
        let mut buffer = SampleBuffer::new();
        buffer.append(&m, 0.0);
        assert!((buffer.yaw()[0] - (-30.0)).abs() < 1e-9);
        assert!((convert_to_euler(&m).yaw - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_rows_and_json() {
        let mut buffer = SampleBuffer::with_capacity(2);
        buffer.append(&IDENTITY_MATRIX, 0.0);
        buffer.append(&rotation(0.0, 0.0, 0.0, [1.0, 2.0, 3.0]), 0.01);
        let xs: Vec<f64> = buffer.rows().map(|r| r.x).collect();
        assert_eq!(xs, vec![0.0, 1.0]);

        let json: serde_json::Value = serde_json::from_str(&buffer.to_json().unwrap()).unwrap();
        assert_eq!(json["z"][1], 3.0);
        assert_eq!(json["time"].as_array().unwrap().len(), 2);
    }
}
