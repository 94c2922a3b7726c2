/*! Representation of observed segments.

The analyzer never touches raw octets. Link, IP and TCP header decoding happens before a segment
is handed over, so this module only provides the *representation* of what was decoded:

 * [`SeqNumber`], a position in the 32-bit sequence space with wraparound-safe ordering.
 * [`Segment`], the header fields of one observed segment together with its capture time and
   direction relative to the analyzed host.
 * [`SackState`], the selective acknowledgement blocks of an incoming segment and the derived
   queries the connection analysis needs (duplicate reports, holes, sacked bytes).

[`SeqNumber`]: struct.SeqNumber.html
[`Segment`]: struct.Segment.html
[`SackState`]: struct.SackState.html
*/
mod error;
mod sack;
mod segment;
mod seq;

pub use self::error::{Error, Result};
pub use self::sack::SackState;
pub use self::segment::{Direction, Flags, FourTuple, Segment};
pub use self::seq::SeqNumber;
