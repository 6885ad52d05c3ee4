//! AST → IL lowering.
//!
//! A visitor over the type-checked AST that walks one module at a time,
//! consuming the [`TypeAnnotations`] semantic analysis already produced
//! for it. Named variables (globals, locals, parameters) are
//! memory-resident: reads lower to `LOAD_MEM`, writes to `STORE_MEM`.
//! Registers are single-assignment temporaries for expression evaluation
//! and the two explicit control-flow join points — short-circuit `&&`/`||`
//! and ternary — never general variable mutation, so the SSA
//! single-definition property holds without a full SSA construction pass.

use crate::error::{InternalError, Result};
use crate::function::{IlFunction, Parameter};
use crate::instr::{ExtraOperand, MemSlot, Opcode};
use crate::module::{Global, IlModule};
use crate::value::{BlockId, Value};
use blend65_ast::{BinaryOp, Block, Decl, Expr, Program, Stmt, UnaryOp};
use blend65_base::{Interner, Symbol};
use blend65_sema::check::{ConstValue, TypeAnnotations};
use blend65_sema::symbol::{Intrinsic, ScopeId, ScopeKind, SymbolId, SymbolKind, SymbolTable};
use blend65_types::{TypeInfo, TypeRegistry};
use rustc_hash::FxHashMap;
use std::rc::Rc;

struct LoopTargets {
    break_target: BlockId,
    continue_target: BlockId,
}

/// Lowers one already-analyzed module to IL. Borrows the shared
/// [`SymbolTable`]/[`TypeRegistry`] rather than owning a copy.
pub struct IlGenerator<'sym> {
    symbols: &'sym SymbolTable,
    types: &'sym TypeRegistry,
    interner: &'sym Interner,
    annotations: &'sym TypeAnnotations,
    module_name: String,
    enum_ordinals: FxHashMap<Symbol, u32>,
    loop_stack: Vec<LoopTargets>,
    switch_break_stack: Vec<BlockId>,
    current_function: String,
}

impl<'sym> IlGenerator<'sym> {
    pub fn new(symbols: &'sym SymbolTable, types: &'sym TypeRegistry, interner: &'sym Interner, annotations: &'sym TypeAnnotations, module_name: impl Into<String>) -> Self {
        Self {
            symbols,
            types,
            interner,
            annotations,
            module_name: module_name.into(),
            enum_ordinals: FxHashMap::default(),
            loop_stack: Vec::new(),
            switch_break_stack: Vec::new(),
            current_function: String::new(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        format!("{}.{}", self.module_name, name)
    }

    fn name_of(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// Lowers an entire module: its top-level `let`/`const` globals and
    /// every function.
    pub fn generate(&mut self, program: &Program<'_>, module_scope: ScopeId) -> Result<IlModule> {
        for decl in program.decls {
            if let Decl::TypeDef { is_enum: true, members, .. } = decl {
                for (i, &member) in members.iter().enumerate() {
                    self.enum_ordinals.insert(member, i as u32);
                }
            }
        }

        let mut module = IlModule::new(self.module_name.clone());

        for decl in program.decls {
            if let Decl::Variable { name, init, .. } = decl {
                let slot = MemSlot(self.qualify(self.name_of(*name)));
                let ty = self.symbols.lookup(module_scope, *name).map(|id| self.symbols.symbol(id).ty.clone()).unwrap_or_else(|| self.types.unknown());
                let const_init = init.and_then(|e| self.annotations.const_of(e.id())).map(|c| match c {
                    ConstValue::Number(n) => n,
                    ConstValue::Bool(b) => b as u32,
                });
                module.globals.push(Global { slot, ty, init: const_init });
            }
        }

        // Collection (`blend65_sema::collect`) creates exactly one
        // `Function`-kind child scope of `module_scope` per `Decl::Function`,
        // in source order, and never creates any other child scope at
        // module level (the language is function-scoped: `if`/`while`/`for`
        // bodies don't get their own scope). So zipping the module scope's
        // function-kind children with this same decl iteration recovers
        // each function's scope without storing it anywhere else.
        let func_scopes: Vec<ScopeId> = self.symbols.scope(module_scope).children.iter().filter(|&&c| self.symbols.scope(c).kind == ScopeKind::Function).copied().collect();
        let mut func_index = 0;
        for decl in program.decls {
            if let Decl::Function { name, params, body, .. } = decl {
                let symbol_id = self.symbols.lookup(module_scope, *name).expect("function symbol registered during collection");
                let func_scope = func_scopes[func_index];
                func_index += 1;
                let return_type = self.symbols.symbol(symbol_id).ty.clone();
                let return_type = match &*return_type {
                    TypeInfo::Function { return_type, .. } => return_type.clone(),
                    _ => return_type,
                };
                let func = self.generate_function(self.name_of(*name), func_scope, params, body, return_type)?;
                module.functions.push(func);
            }
        }

        // Stored fully-qualified so it matches `IlFunction::name` (and
        // therefore the label the code generator's `JSR` must target) --
        // see `generate` in `blend65_codegen::codegen`.
        module.entry_point = program.decls.iter().find_map(|d| match d {
            Decl::Function { name, .. } if self.name_of(*name) == "main" => Some(self.qualify(self.name_of(*name))),
            _ => None,
        });

        Ok(module)
    }

    fn generate_function(&mut self, name: &str, func_scope: ScopeId, params: &[blend65_ast::Param<'_>], body: Block<'_>, return_type: Rc<TypeInfo>) -> Result<IlFunction> {
        self.current_function = self.qualify(name);
        let parameters = params
            .iter()
            .map(|p| Parameter { name: self.name_of(p.name).to_string(), slot: MemSlot(format!("{}.{}", self.current_function, self.name_of(p.name))), ty: self.symbols.lookup(func_scope, p.name).map(|id| self.symbols.symbol(id).ty.clone()).unwrap_or_else(|| self.types.unknown()) })
            .collect();
        let mut func = IlFunction::new(self.current_function.clone(), parameters, return_type.clone());
        let entry = func.entry_block;
        let exit = self.generate_block(&mut func, entry, body, func_scope)?;
        if let Some(exit) = exit {
            if !func.block(exit).is_terminated() {
                if matches!(&*return_type, TypeInfo::Void) {
                    func.emit(exit, Opcode::ReturnVoid, Vec::new(), Vec::new(), None, None);
                } else {
                    return Err(InternalError::UnterminatedBlock { function: self.current_function.clone(), block: exit });
                }
            }
        }
        Ok(func)
    }

    /// Derives a variable's storage slot from where it was declared: an
    /// import resolves to its source module's exported name; anything
    /// declared directly in a function scope (parameters and locals)
    /// gets a slot qualified by the current function; anything else
    /// (module-level globals) is qualified by the module alone.
    fn slot_for(&self, id: SymbolId) -> MemSlot {
        let entry = self.symbols.symbol(id);
        if entry.kind == SymbolKind::Imported {
            let (source, original) = entry.imported_from.expect("imported symbol carries its source");
            return MemSlot(format!("{}.{}", self.interner.resolve(source), self.interner.resolve(original)));
        }
        match self.symbols.scope(entry.owning_scope).kind {
            ScopeKind::Function => MemSlot(format!("{}.{}", self.current_function, self.interner.resolve(entry.name))),
            _ => MemSlot(format!("{}.{}", self.module_name, self.interner.resolve(entry.name))),
        }
    }

    /// Lowers `body` starting at `entry`, returning the block that
    /// control falls out the bottom into (`None` if every path already
    /// terminated, e.g. the block ends in `return`).
    fn generate_block(&mut self, func: &mut IlFunction, mut current: BlockId, body: Block<'_>, scope: ScopeId) -> Result<Option<BlockId>> {
        for stmt in body {
            let Some(next) = self.generate_stmt(func, current, stmt, scope)? else {
                return Ok(None);
            };
            current = next;
        }
        Ok(Some(current))
    }

    fn generate_stmt(&mut self, func: &mut IlFunction, block: BlockId, stmt: &Stmt<'_>, scope: ScopeId) -> Result<Option<BlockId>> {
        match stmt {
            Stmt::Block { body, .. } => self.generate_block(func, block, body, scope),
            Stmt::Expr { expr, .. } => {
                self.generate_expr(func, block, expr, scope)?;
                Ok(Some(block))
            }
            Stmt::Let { name, init, .. } => {
                let slot = MemSlot(format!("{}.{}", self.current_function, self.name_of(*name)));
                if let Some(init) = init {
                    let value = self.generate_expr(func, block, init, scope)?;
                    func.emit(block, Opcode::StoreMem, vec![value], vec![ExtraOperand::Mem(slot)], None, Some(stmt.span()));
                }
                Ok(Some(block))
            }
            Stmt::If { cond, then_branch, else_branch, .. } => {
                let cond_value = self.generate_expr(func, block, cond, scope)?;
                let then_block = func.new_block(format!(".Lb{}_then", func.blocks.len()));
                let else_block = func.new_block(format!(".Lb{}_else", func.blocks.len()));
                let merge = func.new_block(format!(".Lb{}_merge", func.blocks.len()));
                func.connect(block, then_block);
                func.connect(block, else_block);
                func.emit(block, Opcode::BranchIfTrue, vec![cond_value], vec![ExtraOperand::Target(then_block), ExtraOperand::Target(else_block)], None, None);

                let then_exit = self.generate_block(func, then_block, then_branch, scope)?;
                if let Some(then_exit) = then_exit {
                    func.connect(then_exit, merge);
                    func.emit(then_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(merge)], None, None);
                }

                let else_exit = match else_branch {
                    Some(else_branch) => self.generate_block(func, else_block, else_branch, scope)?,
                    None => Some(else_block),
                };
                if let Some(else_exit) = else_exit {
                    func.connect(else_exit, merge);
                    func.emit(else_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(merge)], None, None);
                }

                if then_exit.is_none() && else_exit.is_none() {
                    // Both arms terminated (e.g. both `return`): the merge
                    // block is unreachable and left empty; callers treat a
                    // dead empty block as "no fallthrough" by never
                    // reading past it.
                    Ok(None)
                } else {
                    Ok(Some(merge))
                }
            }
            Stmt::While { cond, body, .. } => {
                let header = func.new_block(format!(".Lb{}_header", func.blocks.len()));
                let loop_body = func.new_block(format!(".Lb{}_body", func.blocks.len()));
                let post = func.new_block(format!(".Lb{}_post", func.blocks.len()));
                func.connect(block, header);
                func.emit(block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(header)], None, None);

                let cond_value = self.generate_expr(func, header, cond, scope)?;
                func.connect(header, loop_body);
                func.connect(header, post);
                func.emit(header, Opcode::BranchIfTrue, vec![cond_value], vec![ExtraOperand::Target(loop_body), ExtraOperand::Target(post)], None, None);

                self.loop_stack.push(LoopTargets { break_target: post, continue_target: header });
                let body_exit = self.generate_block(func, loop_body, body, scope)?;
                self.loop_stack.pop();
                if let Some(body_exit) = body_exit {
                    func.connect(body_exit, header);
                    func.emit(body_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(header)], None, None);
                }
                Ok(Some(post))
            }
            Stmt::DoWhile { body, cond, .. } => {
                let loop_body = func.new_block(format!(".Lb{}_body", func.blocks.len()));
                let cond_block = func.new_block(format!(".Lb{}_cond", func.blocks.len()));
                let post = func.new_block(format!(".Lb{}_post", func.blocks.len()));
                func.connect(block, loop_body);
                func.emit(block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(loop_body)], None, None);

                self.loop_stack.push(LoopTargets { break_target: post, continue_target: cond_block });
                let body_exit = self.generate_block(func, loop_body, body, scope)?;
                self.loop_stack.pop();
                if let Some(body_exit) = body_exit {
                    func.connect(body_exit, cond_block);
                    func.emit(body_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(cond_block)], None, None);
                }

                let cond_value = self.generate_expr(func, cond_block, cond, scope)?;
                func.connect(cond_block, loop_body);
                func.connect(cond_block, post);
                func.emit(cond_block, Opcode::BranchIfTrue, vec![cond_value], vec![ExtraOperand::Target(loop_body), ExtraOperand::Target(post)], None, None);
                Ok(Some(post))
            }
            Stmt::ForRange { var, start, end, body, .. } => {
                let slot = MemSlot(format!("{}.{}", self.current_function, self.name_of(*var)));
                let start_value = self.generate_expr(func, block, start, scope)?;
                func.emit(block, Opcode::StoreMem, vec![start_value], vec![ExtraOperand::Mem(slot.clone())], None, None);
                let end_value = self.generate_expr(func, block, end, scope)?;
                let loop_ty = end_value.ty().unwrap_or_else(|| self.types.word());

                let header = func.new_block(format!(".Lb{}_header", func.blocks.len()));
                let loop_body = func.new_block(format!(".Lb{}_body", func.blocks.len()));
                let step = func.new_block(format!(".Lb{}_step", func.blocks.len()));
                let post = func.new_block(format!(".Lb{}_post", func.blocks.len()));
                func.connect(block, header);
                func.emit(block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(header)], None, None);

                let current = func.emit(header, Opcode::LoadMem, Vec::new(), vec![ExtraOperand::Mem(slot.clone())], Some(loop_ty.clone()), None).expect("LOAD_MEM always produces a register");
                let cmp = func.emit(header, Opcode::CmpLe, vec![current, end_value], Vec::new(), Some(self.types.bool_()), None).expect("CMP_LE always produces a register");
                func.connect(header, loop_body);
                func.connect(header, post);
                func.emit(header, Opcode::BranchIfTrue, vec![cmp], vec![ExtraOperand::Target(loop_body), ExtraOperand::Target(post)], None, None);

                self.loop_stack.push(LoopTargets { break_target: post, continue_target: step });
                let body_exit = self.generate_block(func, loop_body, body, scope)?;
                self.loop_stack.pop();
                if let Some(body_exit) = body_exit {
                    func.connect(body_exit, step);
                    func.emit(body_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(step)], None, None);
                }

                let loaded = func.emit(step, Opcode::LoadMem, Vec::new(), vec![ExtraOperand::Mem(slot.clone())], Some(loop_ty.clone()), None).expect("LOAD_MEM always produces a register");
                let one = Value::Constant(1, loop_ty.clone());
                let incremented = func.emit(step, Opcode::Add, vec![loaded, one], Vec::new(), Some(loop_ty), None).expect("ADD always produces a register");
                func.emit(step, Opcode::StoreMem, vec![incremented], vec![ExtraOperand::Mem(slot)], None, None);
                func.connect(step, header);
                func.emit(step, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(header)], None, None);

                Ok(Some(post))
            }
            Stmt::Switch { scrutinee, cases, default, .. } => {
                let scrutinee_value = self.generate_expr(func, block, scrutinee, scope)?;
                let post = func.new_block(format!(".Lb{}_post", func.blocks.len()));
                self.switch_break_stack.push(post);

                let mut dispatch = block;
                for case in cases.iter() {
                    let Some(case_const) = self.annotations.const_of(case.value.id()) else {
                        return Err(InternalError::MalformedIntrinsic { name: "switch-case".to_string(), span: Some(case.span) });
                    };
                    let case_num = match case_const {
                        ConstValue::Number(n) => n,
                        ConstValue::Bool(b) => b as u32,
                    };
                    let case_value = Value::Constant(case_num, scrutinee_value.ty().unwrap_or_else(|| self.types.word()));
                    let eq = func.emit(dispatch, Opcode::CmpEq, vec![scrutinee_value.clone(), case_value], Vec::new(), Some(self.types.bool_()), None).expect("CMP_EQ always produces a register");
                    let case_block = func.new_block(format!(".Lb{}_case", func.blocks.len()));
                    let next_dispatch = func.new_block(format!(".Lb{}_dispatch", func.blocks.len()));
                    func.connect(dispatch, case_block);
                    func.connect(dispatch, next_dispatch);
                    func.emit(dispatch, Opcode::BranchIfTrue, vec![eq], vec![ExtraOperand::Target(case_block), ExtraOperand::Target(next_dispatch)], None, None);

                    let case_exit = self.generate_block(func, case_block, case.body, scope)?;
                    if let Some(case_exit) = case_exit {
                        func.connect(case_exit, post);
                        func.emit(case_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(post)], None, None);
                    }
                    dispatch = next_dispatch;
                }

                let default_exit = match default {
                    Some(default_body) => self.generate_block(func, dispatch, default_body, scope)?,
                    None => Some(dispatch),
                };
                if let Some(default_exit) = default_exit {
                    func.connect(default_exit, post);
                    func.emit(default_exit, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(post)], None, None);
                }

                self.switch_break_stack.pop();
                Ok(Some(post))
            }
            Stmt::Break { .. } => {
                let target = *self.switch_break_stack.last().or_else(|| self.loop_stack.last().map(|l| &l.break_target)).expect("break only type-checks inside a loop or switch");
                func.connect(block, target);
                func.emit(block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(target)], None, None);
                Ok(None)
            }
            Stmt::Continue { .. } => {
                let target = self.loop_stack.last().expect("continue only type-checks inside a loop").continue_target;
                func.connect(block, target);
                func.emit(block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(target)], None, None);
                Ok(None)
            }
            Stmt::Return { value, span, .. } => {
                match value {
                    Some(expr) => {
                        let v = self.generate_expr(func, block, expr, scope)?;
                        func.emit(block, Opcode::Return, vec![v], Vec::new(), None, Some(*span));
                    }
                    None => {
                        func.emit(block, Opcode::ReturnVoid, Vec::new(), Vec::new(), None, Some(*span));
                    }
                }
                Ok(None)
            }
        }
    }

    fn generate_expr(&mut self, func: &mut IlFunction, block: BlockId, expr: &Expr<'_>, scope: ScopeId) -> Result<Value> {
        let ty = self.annotations.type_of(expr.id()).cloned().unwrap_or_else(|| self.types.unknown());
        match expr {
            Expr::Number { value, .. } => Ok(Value::Constant(*value, ty)),
            Expr::Bool { value, .. } => Ok(Value::Constant(*value as u32, ty)),
            Expr::Str { .. } => Ok(func.emit(block, Opcode::Undef, Vec::new(), Vec::new(), Some(ty), Some(expr.span())).expect("UNDEF always produces a register")),
            Expr::Identifier { name, .. } => self.generate_identifier(func, block, *name, ty, scope, expr.span()),
            Expr::Unary { op, operand, .. } => self.generate_unary(func, block, *op, operand, ty, scope),
            Expr::Binary { op, left, right, .. } if op.is_logical() => self.generate_short_circuit(func, block, *op, left, right, scope),
            Expr::Binary { op, left, right, span, .. } => {
                let l = self.generate_expr(func, block, left, scope)?;
                let r = self.generate_expr(func, block, right, scope)?;
                if let (Some(lc), Some(rc)) = (l.as_constant(), r.as_constant()) {
                    if let Some(folded) = fold_binary(*op, lc, rc) {
                        return Ok(Value::Constant(folded, ty));
                    }
                }
                let opcode = binary_opcode(*op);
                Ok(func.emit(block, opcode, vec![l, r], Vec::new(), Some(ty), Some(*span)).expect("binary opcode always produces a register"))
            }
            Expr::Ternary { cond, then_branch, else_branch, .. } => self.generate_ternary(func, block, cond, then_branch, else_branch, ty, scope),
            Expr::Call { callee, args, span, .. } => self.generate_call(func, block, *callee, args, ty, scope, *span),
            Expr::Index { base, index, span, .. } => self.generate_index(func, block, base, index, ty, scope, *span),
            Expr::Member { .. } => Ok(func.emit(block, Opcode::Undef, Vec::new(), Vec::new(), Some(ty), Some(expr.span())).expect("UNDEF always produces a register")),
            Expr::Assign { target, value, span, .. } => self.generate_assign(func, block, target, value, scope, *span),
            Expr::ArrayLiteral { elements, .. } => {
                for el in elements.iter() {
                    self.generate_expr(func, block, el, scope)?;
                }
                Ok(func.emit(block, Opcode::Undef, Vec::new(), Vec::new(), Some(ty), Some(expr.span())).expect("UNDEF always produces a register"))
            }
            Expr::Error { .. } => Ok(Value::Constant(0, ty)),
        }
    }

    fn generate_identifier(&mut self, func: &mut IlFunction, block: BlockId, name: Symbol, ty: Rc<TypeInfo>, scope: ScopeId, span: blend65_base::Span) -> Result<Value> {
        let Some(id) = self.symbols.lookup(scope, name) else {
            return Err(InternalError::UseBeforeDef { function: self.current_function.clone(), span: Some(span) });
        };
        if self.symbols.symbol(id).kind == SymbolKind::EnumMember {
            let ordinal = self.enum_ordinals.get(&name).copied().unwrap_or(0);
            return Ok(Value::Constant(ordinal, ty));
        }
        let slot = self.slot_for(id);
        Ok(func.emit(block, Opcode::LoadMem, Vec::new(), vec![ExtraOperand::Mem(slot)], Some(ty), Some(span)).expect("LOAD_MEM always produces a register"))
    }

    fn generate_unary(&mut self, func: &mut IlFunction, block: BlockId, op: UnaryOp, operand: &Expr<'_>, ty: Rc<TypeInfo>, scope: ScopeId) -> Result<Value> {
        let v = self.generate_expr(func, block, operand, scope)?;
        if let Some(c) = v.as_constant() {
            let folded = match op {
                UnaryOp::Neg => c.wrapping_neg(),
                UnaryOp::Not => (c == 0) as u32,
                UnaryOp::BitNot => !c,
            };
            return Ok(Value::Constant(folded, ty));
        }
        let opcode = match op {
            UnaryOp::Neg => Opcode::Neg,
            UnaryOp::Not => Opcode::Not,
            UnaryOp::BitNot => Opcode::Not,
        };
        Ok(func.emit(block, opcode, vec![v], Vec::new(), Some(ty), Some(operand.span())).expect("unary opcode always produces a register"))
    }

    /// `&&`/`||` lower to explicit control flow with a phi join, never a
    /// plain `AND`/`OR` instruction, so the right-hand side is only
    /// evaluated when it can affect the result.
    fn generate_short_circuit(&mut self, func: &mut IlFunction, block: BlockId, op: BinaryOp, left: &Expr<'_>, right: &Expr<'_>, scope: ScopeId) -> Result<Value> {
        let bool_ty = self.types.bool_();
        let lhs = self.generate_expr(func, block, left, scope)?;
        let rhs_block = func.new_block(format!(".Lb{}_rhs", func.blocks.len()));
        let merge = func.new_block(format!(".Lb{}_merge", func.blocks.len()));
        func.connect(block, rhs_block);
        func.connect(block, merge);
        match op {
            BinaryOp::And => {
                func.emit(block, Opcode::BranchIfTrue, vec![lhs.clone()], vec![ExtraOperand::Target(rhs_block), ExtraOperand::Target(merge)], None, None);
            }
            BinaryOp::Or => {
                func.emit(block, Opcode::BranchIfFalse, vec![lhs.clone()], vec![ExtraOperand::Target(rhs_block), ExtraOperand::Target(merge)], None, None);
            }
            _ => unreachable!("only && and || reach generate_short_circuit"),
        }
        let rhs = self.generate_expr(func, rhs_block, right, scope)?;
        func.connect(rhs_block, merge);
        func.emit(rhs_block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(merge)], None, None);

        let sources = vec![(lhs, block), (rhs, rhs_block)];
        Ok(func.emit(merge, Opcode::Phi, Vec::new(), vec![ExtraOperand::PhiSources(sources)], Some(bool_ty), None).expect("PHI always produces a register"))
    }

    fn generate_ternary(&mut self, func: &mut IlFunction, block: BlockId, cond: &Expr<'_>, then_branch: &Expr<'_>, else_branch: &Expr<'_>, ty: Rc<TypeInfo>, scope: ScopeId) -> Result<Value> {
        let cond_value = self.generate_expr(func, block, cond, scope)?;
        let then_block = func.new_block(format!(".Lb{}_then", func.blocks.len()));
        let else_block = func.new_block(format!(".Lb{}_else", func.blocks.len()));
        let merge = func.new_block(format!(".Lb{}_merge", func.blocks.len()));
        func.connect(block, then_block);
        func.connect(block, else_block);
        func.emit(block, Opcode::BranchIfTrue, vec![cond_value], vec![ExtraOperand::Target(then_block), ExtraOperand::Target(else_block)], None, None);

        let then_value = self.generate_expr(func, then_block, then_branch, scope)?;
        func.connect(then_block, merge);
        func.emit(then_block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(merge)], None, None);

        let else_value = self.generate_expr(func, else_block, else_branch, scope)?;
        func.connect(else_block, merge);
        func.emit(else_block, Opcode::Branch, Vec::new(), vec![ExtraOperand::Target(merge)], None, None);

        let sources = vec![(then_value, then_block), (else_value, else_block)];
        Ok(func.emit(merge, Opcode::Phi, Vec::new(), vec![ExtraOperand::PhiSources(sources)], Some(ty), None).expect("PHI always produces a register"))
    }

    fn generate_call(&mut self, func: &mut IlFunction, block: BlockId, callee: Symbol, args: &[&Expr<'_>], ty: Rc<TypeInfo>, scope: ScopeId, span: blend65_base::Span) -> Result<Value> {
        let name = self.name_of(callee);
        if let Some(intrinsic) = Intrinsic::by_name(name) {
            return self.generate_intrinsic(func, block, intrinsic, args, ty, scope, span);
        }
        let arg_values: Vec<Value> = args.iter().map(|a| self.generate_expr(func, block, a, scope)).collect::<Result<_>>()?;
        let callee_name = match self.symbols.lookup(scope, callee).map(|id| self.symbols.symbol(id).clone()) {
            Some(entry) if entry.kind == SymbolKind::Imported => {
                let (source, original) = entry.imported_from.expect("imported symbol carries its source");
                format!("{}.{}", self.interner.resolve(source), self.interner.resolve(original))
            }
            _ => self.qualify(name),
        };
        if matches!(&*ty, TypeInfo::Void) {
            func.emit(block, Opcode::CallVoid, arg_values, vec![ExtraOperand::Callee(callee_name)], None, Some(span));
            Ok(Value::Constant(0, self.types.void()))
        } else {
            Ok(func.emit(block, Opcode::Call, arg_values, vec![ExtraOperand::Callee(callee_name)], Some(ty), Some(span)).expect("CALL always produces a register"))
        }
    }

    fn generate_intrinsic(&mut self, func: &mut IlFunction, block: BlockId, intrinsic: Intrinsic, args: &[&Expr<'_>], ty: Rc<TypeInfo>, scope: ScopeId, span: blend65_base::Span) -> Result<Value> {
        match intrinsic {
            Intrinsic::Peek => {
                let addr = self.generate_expr(func, block, args[0], scope)?;
                Ok(func.emit(block, Opcode::HwRead, vec![addr], Vec::new(), Some(ty), Some(span)).expect("HW_READ always produces a register"))
            }
            Intrinsic::Poke => {
                let addr = self.generate_expr(func, block, args[0], scope)?;
                let value = self.generate_expr(func, block, args[1], scope)?;
                func.emit(block, Opcode::HwWrite, vec![addr, value], Vec::new(), None, Some(span));
                Ok(Value::Constant(0, self.types.void()))
            }
            Intrinsic::Hi => {
                let w = self.generate_expr(func, block, args[0], scope)?;
                let eight = Value::Constant(8, self.types.byte());
                Ok(func.emit(block, Opcode::Shr, vec![w, eight], Vec::new(), Some(self.types.byte()), Some(span)).expect("SHR always produces a register"))
            }
            Intrinsic::Lo => {
                let w = self.generate_expr(func, block, args[0], scope)?;
                let mask = Value::Constant(0xFF, self.types.word());
                Ok(func.emit(block, Opcode::And, vec![w, mask], Vec::new(), Some(self.types.byte()), Some(span)).expect("AND always produces a register"))
            }
            Intrinsic::Len => {
                let arr_ty = self.annotations.type_of(args[0].id()).cloned();
                let len = match arr_ty.as_deref() {
                    Some(TypeInfo::Array { len: Some(n), .. }) => *n,
                    _ => 0,
                };
                self.generate_expr(func, block, args[0], scope)?;
                Ok(Value::Constant(len, self.types.word()))
            }
        }
    }

    fn generate_index(&mut self, func: &mut IlFunction, block: BlockId, base: &Expr<'_>, index: &Expr<'_>, ty: Rc<TypeInfo>, scope: ScopeId, span: blend65_base::Span) -> Result<Value> {
        let Expr::Identifier { name, .. } = base else {
            return Err(InternalError::MalformedIntrinsic { name: "index-base".to_string(), span: Some(span) });
        };
        let Some(id) = self.symbols.lookup(scope, *name) else {
            return Err(InternalError::UseBeforeDef { function: self.current_function.clone(), span: Some(span) });
        };
        let base_slot = self.slot_for(id);
        let index_value = self.generate_expr(func, block, index, scope)?;
        let elem_width = Value::Constant(ty.width().max(1), self.types.word());
        let offset = func.emit(block, Opcode::Mul, vec![index_value, elem_width], Vec::new(), Some(self.types.word()), Some(span)).expect("MUL always produces a register");
        Ok(func.emit(block, Opcode::LoadMem, vec![offset], vec![ExtraOperand::Mem(base_slot)], Some(ty), Some(span)).expect("LOAD_MEM always produces a register"))
    }

    fn generate_assign(&mut self, func: &mut IlFunction, block: BlockId, target: &Expr<'_>, value: &Expr<'_>, scope: ScopeId, span: blend65_base::Span) -> Result<Value> {
        let rhs = self.generate_expr(func, block, value, scope)?;
        match target {
            Expr::Identifier { name, .. } => {
                let Some(id) = self.symbols.lookup(scope, *name) else {
                    return Err(InternalError::UseBeforeDef { function: self.current_function.clone(), span: Some(span) });
                };
                let slot = self.slot_for(id);
                func.emit(block, Opcode::StoreMem, vec![rhs.clone()], vec![ExtraOperand::Mem(slot)], None, Some(span));
                Ok(rhs)
            }
            Expr::Index { base, index, .. } => {
                let Expr::Identifier { name, .. } = **base else {
                    return Err(InternalError::MalformedIntrinsic { name: "index-base".to_string(), span: Some(span) });
                };
                let Some(id) = self.symbols.lookup(scope, name) else {
                    return Err(InternalError::UseBeforeDef { function: self.current_function.clone(), span: Some(span) });
                };
                let base_slot = self.slot_for(id);
                let index_value = self.generate_expr(func, block, index, scope)?;
                let elem_ty = self.annotations.type_of(target.id()).cloned().unwrap_or_else(|| self.types.unknown());
                let elem_width = Value::Constant(elem_ty.width().max(1), self.types.word());
                let offset = func.emit(block, Opcode::Mul, vec![index_value, elem_width], Vec::new(), Some(self.types.word()), Some(span)).expect("MUL always produces a register");
                func.emit(block, Opcode::StoreMem, vec![offset, rhs.clone()], vec![ExtraOperand::Mem(base_slot)], None, Some(span));
                Ok(rhs)
            }
            _ => Err(InternalError::MalformedIntrinsic { name: "assign-target".to_string(), span: Some(span) }),
        }
    }
}

fn binary_opcode(op: BinaryOp) -> Opcode {
    match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::BitAnd => Opcode::And,
        BinaryOp::BitOr => Opcode::Or,
        BinaryOp::BitXor => Opcode::Xor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
        BinaryOp::Eq => Opcode::CmpEq,
        BinaryOp::NotEq => Opcode::CmpNe,
        BinaryOp::Lt => Opcode::CmpLt,
        BinaryOp::LtEq => Opcode::CmpLe,
        BinaryOp::Gt => Opcode::CmpGt,
        BinaryOp::GtEq => Opcode::CmpGe,
        BinaryOp::And | BinaryOp::Or => unreachable!("logical ops lower via generate_short_circuit"),
    }
}

/// Folds a binary operator over two known-constant operands. Returns `None` for division/modulo by zero, left to
/// the semantic analyzer's `S012` diagnostic rather than panicking here.
fn fold_binary(op: BinaryOp, l: u32, r: u32) -> Option<u32> {
    Some(match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div => l.checked_div(r)?,
        BinaryOp::Mod => l.checked_rem(r)?,
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl => l.wrapping_shl(r),
        BinaryOp::Shr => l.wrapping_shr(r),
        BinaryOp::Eq => (l == r) as u32,
        BinaryOp::NotEq => (l != r) as u32,
        BinaryOp::Lt => (l < r) as u32,
        BinaryOp::LtEq => (l <= r) as u32,
        BinaryOp::Gt => (l > r) as u32,
        BinaryOp::GtEq => (l >= r) as u32,
        BinaryOp::And | BinaryOp::Or => return None,
    })
}
