use std::str::FromStr;
use structopt::StructOpt;

use impdiff::cipher::MixColumns;
use impdiff::emitter::XorMode;

/// The generators of S-box model files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SboxKind {
    Identity,
    Arbitrary,
    Table,
}

impl FromStr for SboxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity"  => Ok(SboxKind::Identity),
            "arbitrary" => Ok(SboxKind::Arbitrary),
            "table"     => Ok(SboxKind::Table),
            _           => Err(String::from("Unknown S-box kind.")),
        }
    }
}

#[derive(Clone, Debug, StructOpt)]
#[structopt(name = "impdiff", about = "Search for impossible differentials of AES-like block ciphers.")]
pub enum ImpdiffOptions {
    #[structopt(name = "search")]
    Search {
        #[structopt(short = "c", long = "cipher")]
        /**
        Name of the cipher to analyse. Current available ciphers are:
        aes, skinny64, skinny128
        */
        cipher: String,

        #[structopt(short = "r", long = "rounds")]
        /**
        The number of rounds of the main model.
        */
        rounds: usize,

        #[structopt(short = "s", long = "sbox")]
        /**
        Path to the S-box model file (JSON) used for every cell.
        */
        sbox: String,

        #[structopt(short = "m", long = "mixcol", default_value = "original")]
        /**
        Model of the MixColumns step. Currently supported are:
        original, equivalent, identity
        */
        mixcol: MixColumns,

        #[structopt(short = "x", long = "xor", default_value = "binary")]
        /**
        Encoding of XOR constraints. Currently supported are:
        binary, integer, both
        */
        xor: XorMode,

        #[structopt(short = "i", long = "in_cell")]
        /**
        The active input cell.
        */
        in_cell: usize,

        #[structopt(short = "o", long = "out_cell")]
        /**
        The active output cell. If not provided, every output cell is searched in turn.
        */
        out_cell: Option<usize>,

        #[structopt(long = "aux_in", default_value = "2")]
        /**
        The number of rounds of the auxiliary input model.
        */
        aux_in: usize,

        #[structopt(long = "aux_out", default_value = "2")]
        /**
        The number of rounds of the auxiliary output model.
        */
        aux_out: usize,

        #[structopt(long = "restrict")]
        /**
        Restrict the models to a single active cell at the input and output, which speeds up the queries.
        */
        restrict: bool,

        #[structopt(short = "f", long = "file_out")]
        /**
        Path of a file in which to dump the impossible differentials found, one pair per line.
        */
        file_out: Option<String>,
    },

    #[structopt(name = "min-active")]
    MinActive {
        #[structopt(short = "c", long = "cipher", help = "Name of the cipher to analyse.")]
        cipher: String,

        #[structopt(short = "r", long = "rounds", help = "Number of rounds of the model.")]
        rounds: usize,

        #[structopt(short = "s", long = "sbox", help = "Path to the S-box model file.")]
        sbox: String,

        #[structopt(short = "m", long = "mixcol", default_value = "original", help = "Model of the MixColumns step.")]
        mixcol: MixColumns,
    },

    #[structopt(name = "sbox")]
    Sbox {
        #[structopt(short = "k", long = "kind")]
        /**
        The S-box model to generate. Currently supported are:
        identity, arbitrary, table
        */
        kind: SboxKind,

        #[structopt(short = "n", long = "bits", default_value = "8")]
        /**
        Width of the S-box in bits. Ignored for the table kind, which takes the width of the cipher.
        */
        bits: usize,

        #[structopt(short = "c", long = "cipher")]
        /**
        Cipher whose S-box table is modelled, required by the table kind.
        */
        cipher: Option<String>,

        #[structopt(short = "m", long = "mixcol", default_value = "original")]
        /**
        Model of the MixColumns step the table is meant for. The equivalent AES model needs a modified table.
        */
        mixcol: MixColumns,

        #[structopt(short = "o", long = "output")]
        /**
        Path of the model file to write.
        */
        output: String,
    },
}
