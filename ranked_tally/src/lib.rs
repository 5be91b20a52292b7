/*!
Counting engine for elections run with encoded ballot records.

A tally run takes the configuration of an election and the stored records of
its valid votes, and produces one result per question:

- plurality (and approval) counts,
- Condorcet rankings with the Schulze (beatpath) method,
- single transferable vote with the weighted inclusive Gregory method.

The run is a pure batch computation: the same records always give the same
result, whatever the order in which they are processed.

See the [manual] for the record formats and the shape of the results, and
[builder::Builder] for the simplest way to count votes held in memory.
*/

mod config;
mod result;
mod tallier;

pub mod builder;
pub mod codec;
pub mod election;
pub mod manual;
pub mod plurality;
pub mod schulze;
pub mod stv;

pub use crate::config::*;
pub use crate::election::{resolve_crypt, Crypt, ElectionTallier, NoCrypt, VoteSource};
pub use crate::result::*;
pub use crate::tallier::QuestionTallier;
