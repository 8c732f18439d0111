//! Output schemas turning the two eye states into messages, a log row and a status line

use crate::gaze::GazeState;
use crate::recording::LogRow;
use crate::sink::OutboundMessage;
use crate::transform::{
    average_eyelid, eyelid, eyes_closed_amount, is_blinking, OutputVariant,
    PUPIL_DILATION_PLACEHOLDER,
};

pub const EYES_CLOSED_AMOUNT: &str = "/tracking/eye/EyesClosedAmount";
pub const LEFT_RIGHT_PITCH_YAW: &str = "/tracking/eye/LeftRightPitchYaw";

pub const EYE_LID_LEFT: &str = "/avatar/parameters/v2/EyeLidLeft";
pub const EYE_LID_RIGHT: &str = "/avatar/parameters/v2/EyeLidRight";
pub const EYE_LID: &str = "/avatar/parameters/v2/EyeLid";
pub const EYE_LEFT_X: &str = "/avatar/parameters/v2/EyeLeftX";
pub const EYE_LEFT_Y: &str = "/avatar/parameters/v2/EyeLeftY";
pub const EYE_RIGHT_X: &str = "/avatar/parameters/v2/EyeRightX";
pub const EYE_RIGHT_Y: &str = "/avatar/parameters/v2/EyeRightY";
pub const PUPIL_DILATION: &str = "/avatar/parameters/v2/PupilDilation";

/// Everything one dispatch tick produces, in send order
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFrame {
    pub messages: Vec<OutboundMessage>,
    pub log_row: LogRow,
    pub status: String,
}

/// Maps the current eye states to an output frame
pub trait OutputSchema: Send + Sync + 'static {
    fn frame(&self, left: &GazeState, right: &GazeState) -> OutputFrame;

    /// CSV header including the leading timestamp column
    fn csv_header(&self) -> &'static str;

    fn variant(&self) -> OutputVariant;
}

pub fn schema_for(variant: OutputVariant) -> Box<dyn OutputSchema> {
    match variant {
        OutputVariant::Angular => Box::new(AngularSchema),
        OutputVariant::Bipolar => Box::new(BipolarSchema),
    }
}

/// Pitch/yaw schema with a joint blink gate
///
/// Each eye's state holds `(pitch, yaw)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AngularSchema;

impl OutputSchema for AngularSchema {
    fn frame(&self, left: &GazeState, right: &GazeState) -> OutputFrame {
        let blinking = is_blinking(left.valid, right.valid);
        let closed = eyes_closed_amount(left.valid, right.valid);

        let mut messages = vec![OutboundMessage::scalar(EYES_CLOSED_AMOUNT, closed)];
        if !blinking {
            messages.push(OutboundMessage::list(
                LEFT_RIGHT_PITCH_YAW,
                vec![left.value_a, left.value_b, right.value_a, right.value_b],
            ));
        }

        let angles = |v: f32| (!blinking).then_some(v);
        let log_row = LogRow(vec![
            Some(closed),
            angles(left.value_a),
            angles(left.value_b),
            angles(right.value_a),
            angles(right.value_b),
        ]);

        let status = format!(
            "VRChat OSC -> Left(P/Y): {:.1}/{:.1} | Right(P/Y): {:.1}/{:.1} | Closed: {:.2}",
            left.value_a, left.value_b, right.value_a, right.value_b, closed
        );

        OutputFrame {
            messages,
            log_row,
            status,
        }
    }

    fn csv_header(&self) -> &'static str {
        "timestamp,eyes_closed,left_pitch,left_yaw,right_pitch,right_yaw"
    }

    fn variant(&self) -> OutputVariant {
        OutputVariant::Angular
    }
}

/// Signed XY schema with per-eye gating
///
/// Each eye's state holds `(x', y')`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BipolarSchema;

impl OutputSchema for BipolarSchema {
    fn frame(&self, left: &GazeState, right: &GazeState) -> OutputFrame {
        let left_lid = eyelid(left.valid);
        let right_lid = eyelid(right.valid);
        let avg_lid = average_eyelid(left_lid, right_lid);

        let mut messages = vec![
            OutboundMessage::scalar(EYE_LID_LEFT, left_lid),
            OutboundMessage::scalar(EYE_LID_RIGHT, right_lid),
            OutboundMessage::scalar(EYE_LID, avg_lid),
        ];
        if left.valid {
            messages.push(OutboundMessage::scalar(EYE_LEFT_X, left.value_a));
            messages.push(OutboundMessage::scalar(EYE_LEFT_Y, left.value_b));
        }
        if right.valid {
            messages.push(OutboundMessage::scalar(EYE_RIGHT_X, right.value_a));
            messages.push(OutboundMessage::scalar(EYE_RIGHT_Y, right.value_b));
        }
        messages.push(OutboundMessage::scalar(
            PUPIL_DILATION,
            PUPIL_DILATION_PLACEHOLDER,
        ));

        // Stale values are logged as-is for invalid eyes
        let log_row = LogRow(vec![
            Some(left_lid),
            Some(right_lid),
            Some(avg_lid),
            Some(left.value_a),
            Some(left.value_b),
            Some(right.value_a),
            Some(right.value_b),
            Some(PUPIL_DILATION_PLACEHOLDER),
        ]);

        let status = format!(
            "VRCFT OSC -> L_Lid:{:.2} R_Lid:{:.2} LRXY:{:.2},{:.2},{:.2},{:.2}",
            left_lid, right_lid, left.value_a, left.value_b, right.value_a, right.value_b
        );

        OutputFrame {
            messages,
            log_row,
            status,
        }
    }

    fn csv_header(&self) -> &'static str {
        "timestamp,LeftEyeLid,RightEyeLid,EyeLid,EyeLeftX,EyeLeftY,EyeRightX,EyeRightY,PupilDilation"
    }

    fn variant(&self) -> OutputVariant {
        OutputVariant::Bipolar
    }
}
