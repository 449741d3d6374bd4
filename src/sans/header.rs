//! Raw event buffers and their top-level header.

use tartan_bitfield::bitfield;
use thiserror::Error;
use zerocopy::FromBytes;

/// Number of words in the fixed header of a physics buffer, before the first
/// ROC bank.
pub const PHYSICS_HEADER_WORDS: usize = 7;

/// Number of words in the header common to every buffer.
pub const EVENT_HEADER_WORDS: usize = 2;

/// An error constructing a raw buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Too few words to hold the event header.
    #[error("Buffer of {0} words is too short to hold an event header.")]
    Truncated(usize),
}

/// The kind of a buffer, taken from the high half of its second word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Physics(u16),
    BeginOfSpill,
    EndOfSpill,
    EndOfRun,
    SpillCounter,
    SlowControl,
    V1495Trigger,
    /// An administrative buffer carrying nothing the decoder needs (prestart,
    /// go, and the scaler and slow-control dumps it does not read).
    Other(u16),
}

impl EventType {
    pub fn from_code(code: u16) -> Self {
        match code {
            11 => Self::BeginOfSpill,
            12 => Self::EndOfSpill,
            14 => Self::V1495Trigger,
            20 => Self::EndOfRun,
            129 => Self::SpillCounter,
            130 => Self::SlowControl,
            17 | 18 | 132 | 140 => Self::Other(code),
            _ => Self::Physics(code),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::BeginOfSpill => 11,
            Self::EndOfSpill => 12,
            Self::V1495Trigger => 14,
            Self::EndOfRun => 20,
            Self::SpillCounter => 129,
            Self::SlowControl => 130,
            Self::Physics(code) | Self::Other(code) => code,
        }
    }

    /// Whether this buffer closes the accumulating spill.
    pub fn is_boundary(self) -> bool {
        matches!(self, Self::BeginOfSpill | Self::EndOfRun)
    }
}

/// The header common to every buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventHeader {
    /// Total number of words in the buffer, including this header.
    pub total_words: usize,
    pub event_type: EventType,
    /// Event sequence tag assigned by the acquisition system.
    pub tag: u16,
}

/// An owned buffer holding one event as read from the acquisition system.
///
/// The first word holds the length of the buffer minus one. Where this
/// disagrees with the number of words actually held, the shorter of the two
/// bounds all decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBuffer {
    words: Vec<u32>,
}

impl RawBuffer {
    pub fn new(words: Vec<u32>) -> Result<Self, HeaderError> {
        if words.len() < EVENT_HEADER_WORDS {
            Err(HeaderError::Truncated(words.len()))?;
        }

        Ok(Self { words })
    }

    /// The words of this buffer, bounded by its declared length.
    pub fn words(&self) -> &[u32] {
        let declared = (self.words[0] as usize).saturating_add(1);
        &self.words[..declared.min(self.words.len())]
    }

    /// Whether fewer words are held than the buffer declares.
    pub fn is_short(&self) -> bool {
        (self.words[0] as usize).saturating_add(1) > self.words.len()
    }

    pub fn header(&self) -> EventHeader {
        #[repr(C)]
        #[derive(FromBytes)]
        struct Header {
            length: u32,
            event: u32,
        }

        bitfield! {
            struct EventWord(u32) {
                [0..16] tag: u16,
                [16..32] event_type: u16,
            }
        }

        let Header { length, event } = zerocopy::transmute!([self.words[0], self.words[1]]);
        let event = EventWord(event);

        EventHeader {
            total_words: (length as usize).saturating_add(1).min(self.words.len()),
            event_type: EventType::from_code(event.event_type()),
            tag: event.tag(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.header().event_type
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}

impl TryFrom<Vec<u32>> for RawBuffer {
    type Error = HeaderError;

    fn try_from(words: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(words)
    }
}
