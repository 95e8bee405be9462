use notesync_swarm::prelude::*;

fn main() -> Result<(), SwarmError> {
    let swarm_metrics = SwarmAttack::initialize()?.execute()?;
    swarm_metrics.print();

    Ok(())
}
