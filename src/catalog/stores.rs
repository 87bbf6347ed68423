use std::sync::Arc;

use crate::{Access, AttrType, Candidate, CandidateDecl, Result};

const TAG: &str = "store";

pub(super) fn candidates() -> Result<Vec<Arc<Candidate>>> {
    let store = CandidateDecl::new("Store")
        .collector(TAG)
        .abstract_candidate(true)
        .footprint(footprint! {
            info: "Abstract store",
            attr: {
                scheme {},
                netloc {},
                storetrack { ty: AttrType::Bool, optional: true, default: true },
            },
        })
        .build()?;

    let finder = CandidateDecl::new("Finder")
        .extends(&store)
        .reusable(false)
        .footprint(footprint! {
            info: "Local file system",
            attr: {
                scheme { values: ["file"] },
                netloc { optional: true, default: "localhost" },
            },
        })
        .build()?;

    let archive = CandidateDecl::new("Archive")
        .extends(&store)
        .footprint(footprint! {
            info: "Mass archive accessed through ftp",
            attr: {
                scheme { values: ["ftp", "ftserv"] },
                netloc { values: ["hendrix.meteo.fr"], remap: [("hendrix", "hendrix.meteo.fr")] },
                username { optional: true, default: "[identity:user]" },
                storage { optional: true, default: "[username]@[netloc]" },
            },
        })
        .build()?;

    let cache = CandidateDecl::new("Cache")
        .extends(&store)
        .footprint(footprint! {
            info: "Shared cache",
            attr: {
                scheme { values: ["vortex"] },
                netloc { values: ["vortex.cache.fr"] },
                rootdir { optional: true, default: "/home/[identity:user]/cache" },
                headdir { optional: true, default: "vortex", access: Access::RWD },
            },
        })
        .build()?;

    let mtool = CandidateDecl::new("MtoolCache")
        .extends(&cache)
        .footprint(
            footprint! {
                info: "Cache of mtool driven jobs",
                priority: "toolbox",
                attr: {
                    rootdir { optional: true, default: "/scratch/mtool/[identity:user]/cache" },
                },
            }
            .only("glove", ["mtool"]),
        )
        .build()?;

    Ok(vec![store, finder, archive, cache, mtool])
}
