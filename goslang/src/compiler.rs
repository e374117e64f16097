//! Single pass from the syntax tree to a flat instruction sequence.
//!
//! The compile-time environment mirrors the runtime environment chain one
//! frame for one frame, so every identifier becomes a fixed (frame, slot)
//! pair before execution starts.
use thiserror::Error;

use crate::{
    BinaryOperator, Instruction, LexicalAddress, Native, PrimitiveType, Program, UnaryOperator,
    ast::{FuncType, Node, Spec, TypeExpr},
    primitives::predeclared_names,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unresolved identifier `{0}`")]
    UnresolvedIdentifier(String),
    #[error("named results are not supported")]
    NamedReturns,
    #[error("no main function found")]
    MissingMain,
    #[error("main must have no parameters or results")]
    MalformedMain,
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    #[error("program of {0} instructions exceeds the addressable size")]
    ProgramTooLarge(usize),
    #[error("function signature with {0} values exceeds the arity limit")]
    ArityTooLarge(usize),
    #[error("`go` requires a function call")]
    ExpectedCall,
}

/// Ordered frames of ordered names, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileEnv {
    frames: Vec<Vec<String>>,
}

impl CompileEnv {
    /// Environment holding only the predeclared frame.
    pub fn predeclared() -> Self {
        Self {
            frames: vec![predeclared_names().map(str::to_owned).collect()],
        }
    }

    pub fn extend(&self, names: Vec<String>) -> Self {
        let mut frames = self.frames.clone();
        frames.push(names);
        Self { frames }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Innermost declaration wins.
    pub fn resolve(&self, name: &str) -> Result<LexicalAddress, CompileError> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(frame, names)| {
                names
                    .iter()
                    .position(|candidate| candidate == name)
                    .map(|slot| LexicalAddress::new(frame, slot))
            })
            .ok_or_else(|| CompileError::UnresolvedIdentifier(name.to_owned()))
    }
}

/// Names declared directly in a block body. Nested sequences are flattened,
/// nested blocks keep their own names.
fn scan(node: &Node, names: &mut Vec<String>) {
    match node {
        Node::Seq(stmts) => stmts.iter().for_each(|stmt| scan(stmt, names)),
        Node::VarDecl(spec) | Node::ConstDecl(spec) => names.extend(spec.idents.iter().cloned()),
        _ => {}
    }
}

fn substitute_iota(node: &Node, iota: usize) -> Node {
    match node {
        Node::Ident(name) if name == "iota" => Node::Literal {
            value: Native::Int(iota as i64),
            ty: PrimitiveType::Int32,
        },
        Node::Binary { op, left, right } => Node::Binary {
            op: op.clone(),
            left: Box::new(substitute_iota(left, iota)),
            right: Box::new(substitute_iota(right, iota)),
        },
        Node::Unary { op, operand } => Node::Unary {
            op: op.clone(),
            operand: Box::new(substitute_iota(operand, iota)),
        },
        Node::Call { fun, args } => Node::Call {
            fun: fun.clone(),
            args: args.iter().map(|arg| substitute_iota(arg, iota)).collect(),
        },
        other => other.clone(),
    }
}

fn zero_value(ty: PrimitiveType) -> Native {
    match ty {
        PrimitiveType::Bool => Native::Bool(false),
        PrimitiveType::Float64 => Native::Float(0.0),
        _ => Native::Int(0),
    }
}

fn arity(count: usize) -> Result<u8, CompileError> {
    u8::try_from(count).map_err(|_| CompileError::ArityTooLarge(count))
}

#[derive(Debug, Default)]
pub struct Compiler {
    instructions: Vec<Instruction>,
    main: Option<LexicalAddress>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    fn here(&self) -> usize {
        self.instructions.len()
    }

    fn patch(&mut self, at: usize, to: usize) {
        if let Some(Instruction::Goto { target } | Instruction::JumpIfFalse { target }) =
            self.instructions.get_mut(at)
        {
            *target = to;
        }
    }

    /// Turns the trailing `Call` into another call flavour.
    fn rewrite_last_call(&mut self, make: fn(usize) -> Instruction) -> Result<(), CompileError> {
        let Some(last) = self.instructions.last_mut() else {
            return Err(CompileError::ExpectedCall);
        };
        match *last {
            Instruction::Call { arity } => {
                *last = make(arity);
                Ok(())
            }
            _ => Err(CompileError::ExpectedCall),
        }
    }

    fn assign_reversed(&mut self, idents: &[String], env: &CompileEnv) -> Result<(), CompileError> {
        for ident in idents.iter().rev() {
            let address = env.resolve(ident)?;
            self.emit(Instruction::Assign { address });
        }
        Ok(())
    }

    fn compile_declaration(
        &mut self,
        spec: &Spec,
        env: &CompileEnv,
        is_const: bool,
    ) -> Result<(), CompileError> {
        let declared = |i: usize| spec.types.get(i).and_then(TypeExpr::primitive);
        if spec.vals.is_empty() {
            for i in 0..spec.idents.len() {
                match declared(i) {
                    Some(ty) => self.emit(Instruction::LoadConstant {
                        value: zero_value(ty),
                        ty,
                    }),
                    None => self.emit(Instruction::LoadNil),
                };
            }
        }
        for (i, val) in spec.vals.iter().enumerate() {
            let val = if is_const {
                substitute_iota(val, i)
            } else {
                val.clone()
            };
            match (val, declared(i)) {
                (Node::Literal { value, .. }, Some(ty)) => {
                    self.emit(Instruction::LoadConstant { value, ty });
                }
                (val, _) => self.compile(&val, env)?,
            }
        }
        self.assign_reversed(&spec.idents, env)
    }

    fn compile_function(
        &mut self,
        ty: &FuncType,
        body: &Node,
        env: &CompileEnv,
    ) -> Result<(), CompileError> {
        if !ty.results.is_empty() {
            return Err(CompileError::NamedReturns);
        }
        let arity_in = arity(ty.param_types.len())?;
        let arity_out = arity(ty.result_types.len())?;
        let entry = self.here() + 2;
        let entry = u16::try_from(entry).map_err(|_| CompileError::ProgramTooLarge(entry))?;
        self.emit(Instruction::MakeClosure {
            arity_in,
            arity_out,
            entry,
        });
        let goto = self.emit(Instruction::Goto { target: 0 });
        self.compile(body, &env.extend(ty.params.clone()))?;
        self.emit(Instruction::LoadNil);
        self.emit(Instruction::Reset);
        self.patch(goto, self.here());
        Ok(())
    }

    fn compile_package(&mut self, decls: &[Node], env: &CompileEnv) -> Result<(), CompileError> {
        let mut globals = Vec::new();
        for decl in decls {
            match decl {
                Node::VarDecl(spec) | Node::ConstDecl(spec) => {
                    globals.extend(spec.idents.iter().cloned())
                }
                Node::FuncDecl { name, .. } => globals.push(name.clone()),
                _ => {}
            }
        }
        self.emit(Instruction::EnterScope {
            slots: globals.len(),
        });
        let env = env.extend(globals);
        for decl in decls {
            match decl {
                Node::FuncDecl { name, ty, .. } if name == "main" => {
                    if !ty.param_types.is_empty() || !ty.result_types.is_empty() {
                        return Err(CompileError::MalformedMain);
                    }
                    self.main = Some(env.resolve("main")?);
                }
                _ => {}
            }
            self.compile(decl, &env)?;
        }
        let main = self.main.ok_or(CompileError::MissingMain)?;
        self.emit(Instruction::Load { address: main });
        self.emit(Instruction::Call { arity: 0 });
        self.emit(Instruction::ExitScope);
        Ok(())
    }

    pub fn compile(&mut self, node: &Node, env: &CompileEnv) -> Result<(), CompileError> {
        match node {
            Node::Literal { value, ty } => {
                self.emit(Instruction::LoadConstant {
                    value: *value,
                    ty: *ty,
                });
            }
            Node::Ident(name) => {
                let address = env.resolve(name)?;
                self.emit(Instruction::Load { address });
            }
            Node::Unary { op, operand } => {
                self.compile(operand, env)?;
                let op = UnaryOperator::from_symbol(op)
                    .ok_or_else(|| CompileError::UnknownOperator(op.clone()))?;
                self.emit(Instruction::UnaryOp { op });
            }
            Node::Binary { op, left, right } => {
                self.compile(left, env)?;
                self.compile(right, env)?;
                let op = BinaryOperator::from_symbol(op)
                    .ok_or_else(|| CompileError::UnknownOperator(op.clone()))?;
                self.emit(Instruction::BinaryOp { op });
            }
            Node::Call { fun, args } => {
                self.compile(fun, env)?;
                for arg in args {
                    self.compile(arg, env)?;
                }
                self.emit(Instruction::Call { arity: args.len() });
            }
            Node::Assign { idents, vals } => {
                for val in vals {
                    self.compile(val, env)?;
                }
                self.assign_reversed(idents, env)?;
            }
            Node::FuncLit { ty, body } => self.compile_function(ty, body, env)?,
            Node::Seq(stmts) => {
                for stmt in stmts {
                    self.compile(stmt, env)?;
                }
            }
            Node::Block(body) => {
                let mut locals = Vec::new();
                scan(body, &mut locals);
                self.emit(Instruction::EnterScope {
                    slots: locals.len(),
                });
                self.compile(body, &env.extend(locals))?;
                self.emit(Instruction::ExitScope);
            }
            Node::VarDecl(spec) => self.compile_declaration(spec, env, false)?,
            Node::ConstDecl(spec) => self.compile_declaration(spec, env, true)?,
            Node::FuncDecl { name, ty, body } => {
                self.compile_function(ty, body, env)?;
                self.assign_reversed(std::slice::from_ref(name), env)?;
            }
            Node::Return(results) => {
                for result in results {
                    self.compile(result, env)?;
                }
                match results.as_slice() {
                    [single] if single.is_call() => {
                        self.rewrite_last_call(|arity| Instruction::TailCall { arity })?
                    }
                    _ => {
                        self.emit(Instruction::Reset);
                    }
                }
            }
            Node::Package(decls) => self.compile_package(decls, env)?,
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                self.compile(cond, env)?;
                let jump = self.emit(Instruction::JumpIfFalse { target: 0 });
                self.compile(then, env)?;
                let goto = self.emit(Instruction::Goto { target: 0 });
                self.patch(jump, self.here());
                self.compile(otherwise, env)?;
                self.patch(goto, self.here());
            }
            Node::Go(call) => {
                if !call.is_call() {
                    return Err(CompileError::ExpectedCall);
                }
                self.compile(call, env)?;
                self.rewrite_last_call(|arity| Instruction::GoCall { arity })?;
            }
            Node::Nop => {}
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Program, CompileError> {
        if self.main.is_none() {
            return Err(CompileError::MissingMain);
        }
        self.emit(Instruction::Done);
        let len = self.instructions.len();
        if len > usize::from(u16::MAX) {
            return Err(CompileError::ProgramTooLarge(len));
        }
        Ok(Program::new(self.instructions))
    }
}

/// Compiles a `package` tree into a program.
pub fn compile(root: &Node) -> Result<Program, CompileError> {
    let mut compiler = Compiler::new();
    compiler.compile(root, &CompileEnv::predeclared())?;
    let program = compiler.finish()?;
    log::debug!("compiled {} instructions", program.len());
    Ok(program)
}
