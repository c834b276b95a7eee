pub(crate) use serde::{Deserialize, Serialize};
pub(crate) use std::fmt;
