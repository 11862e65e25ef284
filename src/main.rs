#[macro_use]
extern crate log;
extern crate simplelog;

use byte_unit::Byte;
use page_ftl::{Ftl, FtlConfig, FtlStats, Lba};
use rand::prelude::*;
use simplelog::*;
use time::macros::format_description;

fn report(stage: &str, stats: &FtlStats, page_size: usize) {
    let written = Byte::from(stats.host_writes * page_size).get_appropriate_unit(true).to_string();
    info!(
        "{}: host {} ({} pages), WAF {:.3}, GC runs {}, erases {}, wear spread {}",
        stage,
        written,
        stats.host_writes,
        stats.write_amplification(),
        stats.gc_runs,
        stats.erases,
        stats.wear_spread()
    );
    debug!(
        "{}: free {}, valid {}, stale {}",
        stage, stats.free_pages, stats.valid_pages, stats.stale_pages
    );
}

fn run(fw: &Ftl, page_size: usize) -> page_ftl::Result<()> {
    let max_lba = fw.logical_capacity() as Lba - 1;

    for lba in 0..=max_lba {
        fw.write(lba, &lba.to_le_bytes())?;
    }
    info!("Drive preconditioned");
    report("precondition", &fw.stats()?, page_size);

    let mut rng: SmallRng = SmallRng::seed_from_u64(7);

    for c in 0..4 {
        for _ in 0..=max_lba {
            let lba = rng.gen_range(0..=max_lba);
            fw.write(lba, &rng.gen::<u64>().to_le_bytes())?;
        }
        info!("Capacity {} randomly written", c);
        report("random", &fw.stats()?, page_size);
    }

    Ok(())
}

fn main() {
    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();

    SimpleLogger::init(LevelFilter::Info, log_cfg).unwrap();

    let op = 7.0;
    let cfg = FtlConfig::default().with_over_provisioning(op);
    let page_size = cfg.page_size_bytes;

    if let Err(e) = Ftl::new(cfg).and_then(|fw| run(&fw, page_size)) {
        error!("Simulation aborted: {}", e);
        std::process::exit(1);
    }
}
