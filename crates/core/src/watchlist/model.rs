use serde::{Deserialize, Serialize};

use decidra_market_data::InstrumentId;

/// A named, ordered set of instruments. Order is display order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub instruments: Vec<InstrumentId>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instruments: Vec::new(),
        }
    }

    pub fn with_instruments(name: impl Into<String>, instruments: Vec<InstrumentId>) -> Self {
        Self {
            name: name.into(),
            instruments,
        }
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.instruments.contains(id)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
