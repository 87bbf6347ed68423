use std::sync::Arc;

use crate::{AttrType, Candidate, CandidateDecl, Result};

const TAG: &str = "provider";

pub(super) fn candidates() -> Result<Vec<Arc<Candidate>>> {
    let provider = CandidateDecl::new("Provider")
        .collector(TAG)
        .abstract_candidate(true)
        .footprint(footprint! {
            attr: {
                vapp { optional: true, default: "arpege" },
                vconf { optional: true, default: "4dvarfr" },
            },
        })
        .build()?;

    let experiment = CandidateDecl::new("Experiment")
        .extends(&provider)
        .footprint(footprint! {
            info: "Research experiment output",
            attr: {
                experiment { alias: ["xp"], outcast: ["oper", "dble"] },
                block {},
                namespace { optional: true, default: "vortex.cache.fr", values: ["vortex.cache.fr", "vortex.archive.fr"] },
                member { ty: AttrType::Int, optional: true },
            },
        })
        .build()?;

    let suite = CandidateDecl::new("OpSuite")
        .extends(&provider)
        .footprint(footprint! {
            info: "Operational suite output",
            priority: "oper",
            attr: {
                suite { values: ["oper", "dble", "mirr"], remap: [("dbl", "dble"), ("double", "dble")] },
                igakey { optional: true, default: "[vapp]/[vconf]" },
                namespace { optional: true, default: "oper.archive.fr", values: ["oper.archive.fr"] },
            },
        })
        .build()?;

    let remote = CandidateDecl::new("Remote")
        .collector(TAG)
        .footprint(footprint! {
            info: "Anything reachable through a plain path",
            attr: {
                remote { info: "Path on the remote host" },
                hostname { optional: true, default: "localhost" },
                tube { optional: true, default: "file", values: ["file", "ftp", "rcp", "scp"] },
                username { optional: true, default: "[identity:user]" },
            },
        })
        .build()?;

    Ok(vec![provider, experiment, suite, remote])
}
