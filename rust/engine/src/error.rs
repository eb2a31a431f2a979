// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for sleeve placement.
//!
//! Two channels: [`Error`] for faults (provider failures, corrupt geometry,
//! bad configuration) and [`DeclineReason`] for the expected outcome of a
//! penetration that must not receive a sleeve.

use crate::model::ElementId;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Faults raised while processing a model.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The model provider failed to answer a request.
    #[error("model provider error: {0}")]
    Provider(String),

    /// Geometry could not be built or transformed.
    #[error("geometry error: {0}")]
    Geometry(#[from] mep_sleeve_geometry::Error),

    /// A referenced element does not exist in its document.
    #[error("element {0} not found")]
    MissingElement(ElementId),

    /// Configuration rejected by validation or parsing.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A sub-transaction could not be started or committed.
    #[error("transaction failed: {0}")]
    Transaction(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Why a penetration was skipped without placing a sleeve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, thiserror::Error)]
pub enum DeclineReason {
    #[error("host type is not a wall, floor or structural framing")]
    UnsupportedHost,

    #[error("host thickness could not be resolved")]
    UnknownHostThickness,

    #[error("floor is not structural")]
    NonStructuralFloor,

    #[error("segment ends inside the host without crossing it")]
    StubPenetration,

    #[error("no level near the placement elevation")]
    NoLevel,

    #[error("placement point drifted too far from the penetration")]
    PlacementTooFar,

    #[error("placement point collapsed to the world origin")]
    PlacementAtOrigin,

    #[error("sleeve size is not strictly positive")]
    NonPositiveSize,

    #[error("an existing sleeve or cluster already covers this point")]
    Duplicate,

    #[error("no family symbol loaded for the sleeve family")]
    MissingFamilySymbol,
}
