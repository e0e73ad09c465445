mod options;

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::process;
use std::sync::Arc;

use structopt::StructOpt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use impdiff::cipher::{name_to_layer, LinearLayer, MixColumns};
use impdiff::emitter::XorMode;
use impdiff::oracle::SatOracle;
use impdiff::primitive::{Primitive, Side};
use impdiff::sbox::SboxModel;
use impdiff::search::{candidates, equivalence_search};
use impdiff::{Error, Result};

use crate::options::{ImpdiffOptions, SboxKind};

fn layer(cipher: &str, mixcol: MixColumns) -> Result<Box<dyn LinearLayer>> {
    name_to_layer(cipher, mixcol).ok_or_else(|| Error::UnknownCipher(cipher.to_string()))
}

/// Dumps impossible pairs to <path>, overwriting previous contents.
fn dump_results(pairs: &[(u128, u128)], path: &str) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);

    for (x, y) in pairs {
        writeln!(writer, "{:032x},{:032x}", x, y)?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn search(
    cipher: &str,
    rounds: usize,
    sbox: &str,
    mixcol: MixColumns,
    xor: XorMode,
    in_cell: usize,
    out_cell: Option<usize>,
    aux_rounds: (usize, usize),
    restrict: bool,
    file_out: Option<String>,
) -> Result<()> {
    let sbox = Arc::new(SboxModel::load(sbox)?);
    let build = |r| Primitive::with_oracle(SatOracle::new(), layer(cipher, mixcol)?, sbox.clone(), r, xor);

    let mut mid = build(rounds)?;
    let mut aux_in = build(aux_rounds.0)?;
    let mut aux_out = build(aux_rounds.1)?;

    mid.check_cell(in_cell)?;

    if let Some(c) = out_cell {
        mid.check_cell(c)?;
    }

    if restrict {
        mid.restrict_active_cell(in_cell, Side::Input);
        aux_in.restrict_active_cell(in_cell, Side::Input);
    }

    let out_cells = match out_cell {
        Some(c) => vec![c],
        None => (0..mid.num_cells()).collect(),
    };

    let mut found = Vec::new();

    for out_cell in out_cells {
        if restrict {
            mid.restrict_active_cell(out_cell, Side::Output);
            aux_out.restrict_active_cell(out_cell, Side::Output);
        }

        let label = format!("{} {}r in {} out {}", mid.layer().name(), rounds, in_cell, out_cell);
        let pairs = candidates::single_cell(in_cell, out_cell, mid.cell_size());
        let result = equivalence_search(&mut mid, pairs, &mut aux_in, &mut aux_out, &label)?;

        for &(x, y) in &result.impossible {
            println!("{:032x} -> {:032x}", x, y);
        }

        found.extend(result.impossible);

        if restrict {
            mid.unrestrict(Side::Output);
            aux_out.unrestrict(Side::Output);
        }
    }

    info!(found = found.len(), "search finished");

    if let Some(path) = file_out {
        dump_results(&found, &path)?;
    }

    Ok(())
}

fn min_active(cipher: &str, rounds: usize, sbox: &str, mixcol: MixColumns) -> Result<()> {
    let sbox = Arc::new(SboxModel::load(sbox)?);
    let mut model = Primitive::new(layer(cipher, mixcol)?, sbox, rounds)?;
    let cells = model.minimize_active_cells()?;

    println!("{} active cells over {} rounds of {}", cells.len(), rounds, model.layer().name());

    for r in 0..rounds {
        let active: Vec<_> = cells.iter().filter(|&&(round, _)| round == r).map(|&(_, c)| c).collect();
        println!("round {:2}: {:?}", r, active);
    }

    Ok(())
}

fn sbox(kind: SboxKind, bits: usize, cipher: Option<String>, mixcol: MixColumns, output: &str) -> Result<()> {
    let model = match kind {
        SboxKind::Identity => SboxModel::identity(bits),
        SboxKind::Arbitrary => SboxModel::arbitrary(bits, bits),
        SboxKind::Table => {
            let name = cipher.ok_or_else(|| Error::UnknownCipher(String::from("<none>")))?;
            let layer = layer(&name, mixcol)?;
            SboxModel::from_table(layer.cell_size(), &layer.sbox_table())
        }
    };

    model.save(output)?;
    info!(path = output, inequalities = model.inequalities().len(), "wrote S-box model");

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match ImpdiffOptions::from_args() {
        ImpdiffOptions::Search {
            cipher,
            rounds,
            sbox,
            mixcol,
            xor,
            in_cell,
            out_cell,
            aux_in,
            aux_out,
            restrict,
            file_out,
        } => search(&cipher, rounds, &sbox, mixcol, xor, in_cell, out_cell, (aux_in, aux_out), restrict, file_out),
        ImpdiffOptions::MinActive {
            cipher,
            rounds,
            sbox,
            mixcol,
        } => min_active(&cipher, rounds, &sbox, mixcol),
        ImpdiffOptions::Sbox {
            kind,
            bits,
            cipher,
            mixcol,
            output,
        } => self::sbox(kind, bits, cipher, mixcol, &output),
    };

    if let Err(e) = outcome {
        error!("{}", e);
        process::exit(1);
    }
}
