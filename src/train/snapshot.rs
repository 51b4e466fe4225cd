/*!
Independent copies of a `VarStore`'s parameters
*/
use crate::{Error, Result};
use tch::nn::VarStore;
use tch::Tensor;

/// A deep copy of every variable in a `VarStore`, sorted by name.
///
/// The buffers share no storage with the live parameters, so training can continue after a snapshot is taken.
#[derive(Debug)]
pub struct ParameterSnapshot {
    /// The epoch the snapshot was taken at
    pub version: usize,
    buffers: Vec<(String, Tensor)>,
}

impl ParameterSnapshot {
    /// Copy the current parameters of a `VarStore`
    pub fn save(vs: &VarStore, version: usize) -> ParameterSnapshot {
        let mut buffers: Vec<_> = tch::no_grad(|| {
            vs.variables()
                .into_iter()
                .map(|(name, var)| (name, var.detach().copy()))
                .collect()
        });
        buffers.sort_by(|(a, _), (b, _)| a.cmp(b));
        ParameterSnapshot { version, buffers }
    }
    /// Overwrite the parameters of a `VarStore` with this snapshot
    pub fn restore(&self, vs: &VarStore) -> Result<()> {
        let variables = vs.variables();
        if variables.len() != self.buffers.len() {
            return Err(Error::ShapeMismatch(format!(
                "snapshot holds {} parameters, store has {}",
                self.buffers.len(),
                variables.len()
            )));
        }
        tch::no_grad(|| {
            for (name, buffer) in &self.buffers {
                let mut var = variables
                    .get(name)
                    .ok_or_else(|| {
                        Error::ShapeMismatch(format!("parameter {} missing from store", name))
                    })?
                    .shallow_clone();
                var.f_copy_(buffer)?;
            }
            Ok(())
        })
    }
    /// Look up a parameter of the snapshot by name
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.buffers
            .binary_search_by(|(other, _)| other.as_str().cmp(name))
            .ok()
            .map(|i| &self.buffers[i].1)
    }
    /// The number of parameter tensors held
    pub fn len(&self) -> usize {
        self.buffers.len()
    }
    /// Whether the snapshot holds no parameters
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
