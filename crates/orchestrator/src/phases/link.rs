use async_trait::async_trait;
use cubewright_core::{expand_chain, Command, Link, Phase};

use super::{PhaseContext, PhasePlan};
use crate::core::{Batch, Operation, Record};

/// Create joints one after another on a single connection.
///
/// Individual links go first, then chains. A chain is either expanded
/// client-side into one `create_joint` per consecutive pair or, with
/// `server_chains`, sent as one `link_cube_chains`. Prefix links are always
/// server-side and the joints they create are not known to the client.
pub struct LinkPhase;

impl LinkPhase {
    fn create(link: Link) -> Vec<Operation> {
        let mut operations = vec![Operation::new(Command::create_joint(&link))];
        if !link.parameters.is_empty() {
            operations.push(Operation::new(Command::set_joint_params(
                link.joint_name.clone(),
                link.parameters.clone(),
            )));
        }
        operations[0].record = Some(Record::Link(link));
        operations
    }
}

#[async_trait]
impl PhasePlan for LinkPhase {
    fn phase(&self) -> Phase {
        Phase::Link
    }

    async fn plan(&self, ctx: PhaseContext<'_>) -> Batch {
        let structure = ctx.structure;
        let mut operations: Vec<Operation> = structure
            .individual_links()
            .into_iter()
            .flat_map(Self::create)
            .collect();

        for (names, chain) in structure.resolved_chains() {
            let links = expand_chain(&names, &chain.joint_type, &chain.params);
            if structure.server_chains {
                let command = Command::link_chains(
                    vec![names.clone()],
                    chain.joint_type.clone(),
                    chain.params.clone(),
                );
                operations.push(
                    Operation::new(command)
                        .with_label(format!("link_cube_chains:{}", names.join("-")))
                        .recording(Record::Links(links)),
                );
            } else {
                operations.extend(links.into_iter().flat_map(Self::create));
            }
        }

        for bulk in &structure.bulk_links {
            operations.push(Operation::new(Command::link_by_prefix(
                bulk.prefix.clone(),
                bulk.joint_type.clone(),
                bulk.params.clone(),
            )));
        }

        Batch::new("link", operations)
    }
}
